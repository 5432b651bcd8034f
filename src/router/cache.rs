//! 模型实例缓存
//!
//! 首次解析创建实例并缓存，后续请求复用；同一模型的并发首次
//! 请求只触发一次创建（single-flight）。创建失败不缓存，
//! 下一次请求重新尝试。
//!
//! 缓存订阅模型注册表的变更事件：注销、置为不可用、配置更新
//! 都会立即失效对应实例，避免已禁用插件的实例被继续复用。

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::provider::{ChatModel, EmbeddingModel, ImageModel};
use crate::registry::{
    split_model_id, ModelChangeEvent, ModelChangeListener, ModelMetadata, ModelRegistry,
    NamespaceFactoryRegistry, OptionsHandlerRegistry, ResolveError,
};

type Slot<T> = Arc<OnceCell<T>>;

/// 模型实例缓存
pub struct ModelInstanceCache {
    registry: Arc<ModelRegistry>,
    factories: Arc<NamespaceFactoryRegistry>,
    options: Arc<OptionsHandlerRegistry>,
    chat: DashMap<String, Slot<Arc<dyn ChatModel>>>,
    image: DashMap<String, Slot<Arc<dyn ImageModel>>>,
    embedding: DashMap<String, Slot<Arc<dyn EmbeddingModel>>>,
}

impl std::fmt::Debug for ModelInstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstanceCache")
            .field("chat", &self.chat.len())
            .field("image", &self.image.len())
            .field("embedding", &self.embedding.len())
            .finish()
    }
}

impl ModelInstanceCache {
    /// 创建缓存并订阅注册表变更
    pub fn new(
        registry: Arc<ModelRegistry>,
        factories: Arc<NamespaceFactoryRegistry>,
        options: Arc<OptionsHandlerRegistry>,
    ) -> Arc<Self> {
        let cache = Arc::new(Self {
            registry: Arc::clone(&registry),
            factories,
            options,
            chat: DashMap::new(),
            image: DashMap::new(),
            embedding: DashMap::new(),
        });
        registry.add_change_listener(cache.clone() as Arc<dyn ModelChangeListener>);
        cache
    }

    /// 注册表记录与工厂解析，所有实例类型共用
    fn resolve_metadata(
        &self,
        full_id: &str,
    ) -> Result<(Arc<ModelMetadata>, Arc<dyn crate::registry::ModelFactory>), ResolveError> {
        let metadata = self
            .registry
            .get_model_metadata(full_id)
            .ok_or_else(|| ResolveError::ModelNotFound(full_id.to_string()))?;
        if !metadata.available {
            return Err(ResolveError::ModelUnavailable(full_id.to_string()));
        }
        let (namespace, _) = split_model_id(full_id)?;
        let factory = self
            .factories
            .get_factory(namespace)
            .ok_or_else(|| ResolveError::NoFactory(namespace.to_string()))?;
        Ok((metadata, factory))
    }

    fn slot<T: Clone>(map: &DashMap<String, Slot<T>>, full_id: &str) -> Slot<T> {
        map.entry(full_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// 解析对话模型实例（缓存命中直接返回）
    pub async fn chat_model(&self, full_id: &str) -> Result<Arc<dyn ChatModel>, ResolveError> {
        let slot = Self::slot(&self.chat, full_id);
        let instance = slot
            .get_or_try_init(|| async {
                let (metadata, factory) = self.resolve_metadata(full_id)?;
                tracing::debug!("创建对话模型实例: {}", full_id);
                factory
                    .create_chat_model(&metadata, &self.options)
                    .map_err(ResolveError::from)
            })
            .await?;
        Ok(Arc::clone(instance))
    }

    /// 解析图像生成模型实例
    pub async fn image_model(&self, full_id: &str) -> Result<Arc<dyn ImageModel>, ResolveError> {
        let slot = Self::slot(&self.image, full_id);
        let instance = slot
            .get_or_try_init(|| async {
                let (metadata, factory) = self.resolve_metadata(full_id)?;
                tracing::debug!("创建图像模型实例: {}", full_id);
                factory
                    .create_image_model(&metadata, &self.options)
                    .map_err(ResolveError::from)
            })
            .await?;
        Ok(Arc::clone(instance))
    }

    /// 解析向量嵌入模型实例
    pub async fn embedding_model(
        &self,
        full_id: &str,
    ) -> Result<Arc<dyn EmbeddingModel>, ResolveError> {
        let slot = Self::slot(&self.embedding, full_id);
        let instance = slot
            .get_or_try_init(|| async {
                let (metadata, factory) = self.resolve_metadata(full_id)?;
                tracing::debug!("创建嵌入模型实例: {}", full_id);
                factory
                    .create_embedding_model(&metadata, &self.options)
                    .map_err(ResolveError::from)
            })
            .await?;
        Ok(Arc::clone(instance))
    }

    /// 失效单个模型的全部实例
    pub fn evict(&self, full_id: &str) {
        let had = self.chat.remove(full_id).is_some()
            | self.image.remove(full_id).is_some()
            | self.embedding.remove(full_id).is_some();
        if had {
            tracing::debug!("模型实例已失效: {}", full_id);
        }
    }

    /// 当前缓存的实例数（三类合计）
    pub fn len(&self) -> usize {
        self.chat.len() + self.image.len() + self.embedding.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelChangeListener for ModelInstanceCache {
    fn on_change(&self, event: &ModelChangeEvent) -> Result<(), String> {
        match event {
            ModelChangeEvent::Unregistered { full_id }
            | ModelChangeEvent::Updated { full_id }
            | ModelChangeEvent::AvailabilityChanged {
                full_id,
                available: false,
            } => {
                self.evict(full_id);
            }
            _ => {}
        }
        Ok(())
    }
}
