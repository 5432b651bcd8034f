//! 生命周期事件总线
//!
//! 插件状态变化向外部订阅者（控制台缓存失效器等）同步扇出。
//! 每个订阅者的调用有独立的失败边界：返回错误或 panic 都只记日志，
//! 不会阻断其余订阅者，也不会让触发事件的生命周期调用失败。

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::status::PluginStatus;

/// 事件种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// 安装完成
    Installed,
    /// 启用完成
    Enabled,
    /// 禁用完成
    Disabled,
    /// 卸载完成
    Uninstalled,
    /// 配置更新
    ConfigUpdated,
    /// 某阶段失败
    Error {
        /// 失败阶段
        stage: String,
    },
}

/// 生命周期事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// 插件 ID
    pub plugin_id: String,
    /// 事件种类
    pub kind: LifecycleEventKind,
    /// 事件后的插件状态
    pub status: PluginStatus,
    /// 附加消息
    #[serde(default)]
    pub message: Option<String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// 构造事件
    pub fn new(plugin_id: impl Into<String>, kind: LifecycleEventKind, status: PluginStatus) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            kind,
            status,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// 附加消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 事件订阅者
pub trait LifecycleSubscriber: Send + Sync {
    /// 处理一次事件，返回的错误只会被记录
    fn on_event(&self, event: &LifecycleEvent) -> Result<(), String>;
}

/// 生命周期事件总线
#[derive(Default)]
pub struct LifecycleEventBus {
    subscribers: RwLock<Vec<Arc<dyn LifecycleSubscriber>>>,
}

impl std::fmt::Debug for LifecycleEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEventBus")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl LifecycleEventBus {
    /// 创建空总线
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册订阅者
    pub fn subscribe(&self, subscriber: Arc<dyn LifecycleSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// 同步发布事件
    ///
    /// 订阅者可能是外部代码，除错误返回外还兜住 panic。
    pub fn publish(&self, event: &LifecycleEvent) {
        tracing::debug!(
            "生命周期事件: 插件={} 种类={:?} 状态={}",
            event.plugin_id,
            event.kind,
            event.status
        );
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("事件订阅者处理失败: 插件={} 错误={}", event.plugin_id, e);
                }
                Err(_) => {
                    tracing::error!("事件订阅者 panic: 插件={}", event.plugin_id);
                }
            }
        }
    }
}
