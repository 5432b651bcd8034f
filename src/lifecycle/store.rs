//! 安装记录存储（外部协作方接口）
//!
//! 每租户的安装状态行由外部持久化层拥有，本核心只通过
//! `InstallationStore` 读写。附带一个内存实现供测试与嵌入使用。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::PluginStatus;

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 记录不存在
    #[error("安装记录不存在: {0}")]
    NotFound(String),

    /// 后端失败
    #[error("存储后端失败: {0}")]
    Backend(String),
}

/// 插件安装记录
///
/// 外部持久化的行，核心引用不拥有。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginInstallationRecord {
    /// 记录 ID
    pub record_id: String,
    /// 插件 ID
    pub plugin_id: String,
    /// 租户 ID
    pub tenant_id: String,
    /// 当前状态
    pub status: PluginStatus,
    /// 安装目录
    #[serde(default)]
    pub install_path: Option<String>,
    /// 安装时间
    pub installed_at: DateTime<Utc>,
    /// 最近启用时间
    #[serde(default)]
    pub enabled_at: Option<DateTime<Utc>>,
    /// 最近更新时间
    pub updated_at: DateTime<Utc>,
}

impl PluginInstallationRecord {
    /// 构造新记录
    pub fn new(plugin_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            plugin_id: plugin_id.into(),
            tenant_id: tenant_id.into(),
            status: PluginStatus::NotInstalled,
            install_path: None,
            installed_at: now,
            enabled_at: None,
            updated_at: now,
        }
    }
}

/// 安装记录存储接口
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// 写入或覆盖记录
    async fn upsert(&self, record: PluginInstallationRecord) -> Result<(), StoreError>;

    /// 更新状态
    async fn update_status(
        &self,
        tenant_id: &str,
        plugin_id: &str,
        status: PluginStatus,
    ) -> Result<(), StoreError>;

    /// 查询单条记录
    async fn get(
        &self,
        tenant_id: &str,
        plugin_id: &str,
    ) -> Result<Option<PluginInstallationRecord>, StoreError>;

    /// 列出某租户的全部记录
    async fn list(&self, tenant_id: &str) -> Result<Vec<PluginInstallationRecord>, StoreError>;

    /// 删除记录
    async fn remove(&self, tenant_id: &str, plugin_id: &str) -> Result<(), StoreError>;
}

/// 内存实现
#[derive(Default)]
pub struct MemoryInstallationStore {
    records: DashMap<(String, String), PluginInstallationRecord>,
}

impl MemoryInstallationStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstallationStore for MemoryInstallationStore {
    async fn upsert(&self, record: PluginInstallationRecord) -> Result<(), StoreError> {
        self.records.insert(
            (record.tenant_id.clone(), record.plugin_id.clone()),
            record,
        );
        Ok(())
    }

    async fn update_status(
        &self,
        tenant_id: &str,
        plugin_id: &str,
        status: PluginStatus,
    ) -> Result<(), StoreError> {
        let key = (tenant_id.to_string(), plugin_id.to_string());
        let mut entry = self
            .records
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(plugin_id.to_string()))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        if status == PluginStatus::InstalledEnabled {
            entry.enabled_at = Some(entry.updated_at);
        }
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        plugin_id: &str,
    ) -> Result<Option<PluginInstallationRecord>, StoreError> {
        let key = (tenant_id.to_string(), plugin_id.to_string());
        Ok(self.records.get(&key).map(|r| r.clone()))
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<PluginInstallationRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn remove(&self, tenant_id: &str, plugin_id: &str) -> Result<(), StoreError> {
        let key = (tenant_id.to_string(), plugin_id.to_string());
        self.records.remove(&key);
        Ok(())
    }
}
