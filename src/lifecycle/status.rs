//! 插件状态机
//!
//! `PluginStatus` 为封闭枚举，失败状态是一等成员而不是挂在
//! 正常路径上的异常；transition 是 (当前状态, 动作) 的纯函数。
//! `*Failed` 状态允许重试同一动作，不是死胡同。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 插件状态
///
/// 任意时刻每个已知插件恰好处于一个状态，
/// 状态只能经由 transition 变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// 未安装（初始状态）
    #[default]
    NotInstalled,
    /// 安装中
    Installing,
    /// 安装失败（可重试安装）
    InstallFailed,
    /// 已安装未启用
    InstalledDisabled,
    /// 启用中
    Enabling,
    /// 启用失败（可重试启用）
    EnableFailed,
    /// 已安装已启用（唯一允许模型调用成功的状态）
    InstalledEnabled,
    /// 禁用中
    Disabling,
    /// 禁用失败（可重试禁用）
    DisableFailed,
    /// 卸载中
    Uninstalling,
    /// 卸载失败（可重试卸载）
    UninstallFailed,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginStatus::NotInstalled => "not_installed",
            PluginStatus::Installing => "installing",
            PluginStatus::InstallFailed => "install_failed",
            PluginStatus::InstalledDisabled => "installed_disabled",
            PluginStatus::Enabling => "enabling",
            PluginStatus::EnableFailed => "enable_failed",
            PluginStatus::InstalledEnabled => "installed_enabled",
            PluginStatus::Disabling => "disabling",
            PluginStatus::DisableFailed => "disable_failed",
            PluginStatus::Uninstalling => "uninstalling",
            PluginStatus::UninstallFailed => "uninstall_failed",
        };
        write!(f, "{}", s)
    }
}

/// 生命周期动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginAction {
    /// 开始安装
    Install,
    /// 开始启用
    Enable,
    /// 开始禁用
    Disable,
    /// 开始卸载
    Uninstall,
    /// 当前进行中的动作成功
    Succeed,
    /// 当前进行中的动作失败
    Fail,
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginAction::Install => "install",
            PluginAction::Enable => "enable",
            PluginAction::Disable => "disable",
            PluginAction::Uninstall => "uninstall",
            PluginAction::Succeed => "succeed",
            PluginAction::Fail => "fail",
        };
        write!(f, "{}", s)
    }
}

/// 非法状态转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("非法状态转换: 状态 {status} 不允许动作 {action}")]
pub struct StateError {
    /// 当前状态
    pub status: PluginStatus,
    /// 被拒绝的动作
    pub action: PluginAction,
}

/// 状态转换纯函数
///
/// 返回下一状态，或在任何副作用发生之前拒绝非法转换。
pub fn transition(status: PluginStatus, action: PluginAction) -> Result<PluginStatus, StateError> {
    use PluginAction::*;
    use PluginStatus::*;

    let next = match (status, action) {
        (NotInstalled, Install) | (InstallFailed, Install) => Installing,
        (Installing, Succeed) => InstalledDisabled,
        (Installing, Fail) => InstallFailed,

        (InstalledDisabled, Enable) | (EnableFailed, Enable) => Enabling,
        (Enabling, Succeed) => InstalledEnabled,
        (Enabling, Fail) => EnableFailed,

        (InstalledEnabled, Disable) | (DisableFailed, Disable) => Disabling,
        (Disabling, Succeed) => InstalledDisabled,
        (Disabling, Fail) => DisableFailed,

        (
            InstalledDisabled | InstalledEnabled | InstallFailed | EnableFailed | DisableFailed
            | UninstallFailed,
            Uninstall,
        ) => Uninstalling,
        (Uninstalling, Succeed) => NotInstalled,
        (Uninstalling, Fail) => UninstallFailed,

        _ => return Err(StateError { status, action }),
    };
    Ok(next)
}

impl PluginStatus {
    /// 是否已安装（任何安装后的稳定或失败状态）
    pub fn is_installed(&self) -> bool {
        !matches!(self, PluginStatus::NotInstalled | PluginStatus::Installing)
    }

    /// 是否处于失败状态
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            PluginStatus::InstallFailed
                | PluginStatus::EnableFailed
                | PluginStatus::DisableFailed
                | PluginStatus::UninstallFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PluginAction::*;
    use PluginStatus::*;

    #[test]
    fn happy_path_walks_the_full_cycle() {
        let mut status = NotInstalled;
        for (action, expected) in [
            (Install, Installing),
            (Succeed, InstalledDisabled),
            (Enable, Enabling),
            (Succeed, InstalledEnabled),
            (Disable, Disabling),
            (Succeed, InstalledDisabled),
            (Uninstall, Uninstalling),
            (Succeed, NotInstalled),
        ] {
            status = transition(status, action).unwrap();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn failed_states_allow_retry_of_same_action() {
        assert_eq!(transition(InstallFailed, Install).unwrap(), Installing);
        assert_eq!(transition(EnableFailed, Enable).unwrap(), Enabling);
        assert_eq!(transition(DisableFailed, Disable).unwrap(), Disabling);
        assert_eq!(transition(UninstallFailed, Uninstall).unwrap(), Uninstalling);
    }

    #[test]
    fn enable_is_rejected_outside_installed_disabled() {
        for status in [
            NotInstalled,
            Installing,
            InstalledEnabled,
            Disabling,
            Uninstalling,
            InstallFailed,
        ] {
            let err = transition(status, Enable).unwrap_err();
            assert_eq!(err.status, status);
            assert_eq!(err.action, Enable);
        }
    }

    #[test]
    fn uninstall_allowed_from_all_settled_states() {
        for status in [
            InstalledDisabled,
            InstalledEnabled,
            InstallFailed,
            EnableFailed,
            DisableFailed,
            UninstallFailed,
        ] {
            assert_eq!(transition(status, Uninstall).unwrap(), Uninstalling);
        }
        assert!(transition(NotInstalled, Uninstall).is_err());
    }

    #[test]
    fn double_install_is_rejected() {
        let status = transition(NotInstalled, Install).unwrap();
        assert!(transition(status, Install).is_err());
    }
}
