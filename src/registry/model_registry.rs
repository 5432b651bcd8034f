//! 模型注册表
//!
//! 持有 `namespace:modelId -> ModelMetadata` 的运行时记录，
//! 支持注册 / 注销 / 查询 / 可用性标记，并向监听器同步扇出变更事件。
//!
//! 并发约定：
//! - 底层为 DashMap，注册与注销对读者原子，读者不会看到半更新的条目
//! - 监听器在变更调用内同步触发，单个监听器失败只记日志，不影响其余监听器

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::descriptor::{ModelDefinition, ModelType};
use crate::provider::ModelConfig;

/// 注册表运行时记录
///
/// 由 ModelDefinition 派生，附加可用性、配置与审计信息。
/// 只由注册表变更，其余组件只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 完整模型 ID (`namespace:modelId`)
    pub full_id: String,
    /// 命名空间（Provider 代号）
    pub namespace: String,
    /// 模型定义
    pub definition: ModelDefinition,
    /// 运行配置
    pub config: ModelConfig,
    /// 是否可用
    pub available: bool,
    /// 记录版本，每次更新递增
    pub version: u64,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl ModelMetadata {
    /// 从模型定义构造记录
    pub fn new(
        namespace: impl Into<String>,
        definition: ModelDefinition,
        config: ModelConfig,
    ) -> Self {
        let namespace = namespace.into();
        let now = Utc::now();
        Self {
            full_id: format!("{}:{}", namespace, definition.model_id),
            namespace,
            definition,
            config,
            available: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// 模型类型
    pub fn model_type(&self) -> ModelType {
        self.definition.model_type
    }
}

/// 注册表变更事件
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChangeEvent {
    /// 新模型注册
    Registered {
        /// 完整模型 ID
        full_id: String,
    },
    /// 已有模型被覆盖更新
    Updated {
        /// 完整模型 ID
        full_id: String,
    },
    /// 模型注销
    Unregistered {
        /// 完整模型 ID
        full_id: String,
    },
    /// 可用性变更
    AvailabilityChanged {
        /// 完整模型 ID
        full_id: String,
        /// 新的可用性
        available: bool,
    },
}

impl ModelChangeEvent {
    /// 事件关联的完整模型 ID
    pub fn full_id(&self) -> &str {
        match self {
            ModelChangeEvent::Registered { full_id }
            | ModelChangeEvent::Updated { full_id }
            | ModelChangeEvent::Unregistered { full_id }
            | ModelChangeEvent::AvailabilityChanged { full_id, .. } => full_id,
        }
    }
}

/// 注册表变更监听器
pub trait ModelChangeListener: Send + Sync {
    /// 处理一次变更
    ///
    /// 返回的错误只会被记录，不会传播给变更发起方。
    fn on_change(&self, event: &ModelChangeEvent) -> Result<(), String>;
}

/// 模型注册表
///
/// 进程级共享结构，通过构造参数显式传递句柄，不做环境单例。
#[derive(Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<ModelMetadata>>,
    listeners: RwLock<Vec<Arc<dyn ModelChangeListener>>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl ModelRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模型
    ///
    /// 同 ID 重复注册视为覆盖更新：版本号递增，
    /// 监听器收到 `Updated` 而不是 `Registered`。
    pub fn register_model(&self, mut metadata: ModelMetadata) {
        metadata.updated_at = Utc::now();
        let full_id = metadata.full_id.clone();

        let prior = self.models.get(&full_id).map(|m| Arc::clone(&m));
        if let Some(prior) = &prior {
            metadata.created_at = prior.created_at;
            metadata.version = prior.version + 1;
        }
        self.models.insert(full_id.clone(), Arc::new(metadata));

        let event = if prior.is_some() {
            tracing::debug!("模型覆盖更新: {}", full_id);
            ModelChangeEvent::Updated { full_id }
        } else {
            tracing::info!("模型注册: {}", full_id);
            ModelChangeEvent::Registered { full_id }
        };
        self.notify(&event);
    }

    /// 注销模型
    ///
    /// ID 不存在时为 no-op，不触发事件。
    pub fn unregister_model(&self, full_id: &str) {
        if self.models.remove(full_id).is_some() {
            tracing::info!("模型注销: {}", full_id);
            self.notify(&ModelChangeEvent::Unregistered {
                full_id: full_id.to_string(),
            });
        }
    }

    /// 注销某个命名空间下的全部模型，返回被注销的完整 ID
    pub fn unregister_namespace(&self, namespace: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .models
            .iter()
            .filter(|entry| entry.namespace == namespace)
            .map(|entry| entry.full_id.clone())
            .collect();
        for id in &ids {
            self.unregister_model(id);
        }
        ids
    }

    /// 标记可用性
    ///
    /// 实际发生变化时触发 `AvailabilityChanged`。
    pub fn set_availability(&self, full_id: &str, available: bool) {
        let mut changed = false;
        if let Some(mut entry) = self.models.get_mut(full_id) {
            if entry.available != available {
                let mut updated = (**entry).clone();
                updated.available = available;
                updated.version += 1;
                updated.updated_at = Utc::now();
                *entry = Arc::new(updated);
                changed = true;
            }
        }
        if changed {
            tracing::info!("模型可用性变更: {} -> {}", full_id, available);
            self.notify(&ModelChangeEvent::AvailabilityChanged {
                full_id: full_id.to_string(),
                available,
            });
        }
    }

    /// 更新模型配置，触发 `Updated`
    pub fn update_config(&self, full_id: &str, config: ModelConfig) -> bool {
        let mut updated_flag = false;
        if let Some(mut entry) = self.models.get_mut(full_id) {
            let mut updated = (**entry).clone();
            updated.config = config;
            updated.version += 1;
            updated.updated_at = Utc::now();
            *entry = Arc::new(updated);
            updated_flag = true;
        }
        if updated_flag {
            self.notify(&ModelChangeEvent::Updated {
                full_id: full_id.to_string(),
            });
        }
        updated_flag
    }

    /// 查询模型记录
    pub fn get_model_metadata(&self, full_id: &str) -> Option<Arc<ModelMetadata>> {
        self.models.get(full_id).map(|m| Arc::clone(&m))
    }

    /// 按类型列出模型
    pub fn get_models_by_type(&self, model_type: ModelType) -> Vec<Arc<ModelMetadata>> {
        self.models
            .iter()
            .filter(|entry| entry.model_type() == model_type)
            .map(|entry| Arc::clone(&entry))
            .collect()
    }

    /// 列出全部模型记录
    pub fn list_models(&self) -> Vec<Arc<ModelMetadata>> {
        self.models.iter().map(|entry| Arc::clone(&entry)).collect()
    }

    /// 模型是否存在
    pub fn contains_model(&self, full_id: &str) -> bool {
        self.models.contains_key(full_id)
    }

    /// 模型是否存在且可用
    pub fn is_model_available(&self, full_id: &str) -> bool {
        self.models
            .get(full_id)
            .map(|m| m.available)
            .unwrap_or(false)
    }

    /// 注册变更监听器
    pub fn add_change_listener(&self, listener: Arc<dyn ModelChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// 同步扇出事件，逐监听器隔离失败
    fn notify(&self, event: &ModelChangeEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(e) = listener.on_change(event) {
                tracing::warn!("模型变更监听器处理 {:?} 失败: {}", event, e);
            }
        }
    }
}
