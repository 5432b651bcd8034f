//! 命名空间工厂注册表
//!
//! 把 Provider 命名空间映射到能从 ModelDefinition 生产
//! chat / image / embedding 客户端的工厂。此层查找未命中直接报错，
//! 不做默认回退——回退到默认模型是路由层的职责。

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::provider::{
    ChatModel, EmbeddingModel, ImageModel, ModelProvider, ProviderError, ProviderResult,
};

use super::model_registry::ModelMetadata;
use super::options::OptionsHandlerRegistry;

/// 模型解析错误
#[derive(Error, Debug)]
pub enum ResolveError {
    /// 模型不存在
    #[error("模型不存在: {0}")]
    ModelNotFound(String),

    /// 模型当前不可用
    #[error("模型不可用: {0}")]
    ModelUnavailable(String),

    /// 命名空间没有工厂
    #[error("命名空间 {0} 没有已注册的工厂")]
    NoFactory(String),

    /// 模型 ID 格式无效
    #[error("模型 ID 无效: {0}")]
    InvalidModelId(String),

    /// 没有可用的默认模型（路由层的最终失败）
    #[error("没有可用的默认模型")]
    NoDefaultModel,

    /// Provider 错误
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// 拆分完整模型 ID 为 (namespace, modelId)
pub fn split_model_id(full_id: &str) -> Result<(&str, &str), ResolveError> {
    full_id
        .split_once(':')
        .filter(|(ns, id)| !ns.is_empty() && !id.is_empty())
        .ok_or_else(|| ResolveError::InvalidModelId(full_id.to_string()))
}

/// 模型工厂
///
/// 每个命名空间一个，把注册表记录变成可调用的客户端。
/// 不支持的能力返回 Unsupported。
pub trait ModelFactory: Send + Sync {
    /// 工厂所属命名空间
    fn namespace(&self) -> &str;

    /// 创建对话模型客户端
    fn create_chat_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn ChatModel>>;

    /// 创建图像生成模型客户端
    fn create_image_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn ImageModel>>;

    /// 创建向量嵌入模型客户端
    fn create_embedding_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn EmbeddingModel>>;
}

/// 基于 ModelProvider 的标准工厂实现
///
/// 插件启用时由生命周期管理器包装 Provider 实例注册进来。
pub struct ProviderModelFactory {
    provider: Arc<dyn ModelProvider>,
}

impl ProviderModelFactory {
    /// 包装一个 Provider 实例
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// 构建调用选项
    ///
    /// 有处理器时先校验后构建；校验不通过即失败。
    /// 插件配置里的 `options_handler` 字段可按名覆盖默认处理器。
    fn build_options(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Option<crate::provider::BoxedOptions>> {
        let override_name = metadata
            .config
            .extra
            .get("options_handler")
            .and_then(|v| v.as_str());
        let handler = options
            .validated_handler(
                &metadata.namespace,
                metadata.definition.model_type,
                override_name,
                &metadata.config.extra,
            )
            .map_err(|e| {
                ProviderError::InvalidConfig(format!("模型 {}: {}", metadata.full_id, e))
            })?;

        match handler {
            Some(handler) => handler.build_options(&metadata.config.extra).map(Some),
            None => Ok(None),
        }
    }
}

impl ModelFactory for ProviderModelFactory {
    fn namespace(&self) -> &str {
        self.provider.namespace()
    }

    fn create_chat_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn ChatModel>> {
        let built = self.build_options(metadata, options)?;
        self.provider
            .create_chat_model(&metadata.definition, &metadata.config, built)
    }

    fn create_image_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn ImageModel>> {
        let built = self.build_options(metadata, options)?;
        self.provider
            .create_image_model(&metadata.definition, &metadata.config, built)
    }

    fn create_embedding_model(
        &self,
        metadata: &ModelMetadata,
        options: &OptionsHandlerRegistry,
    ) -> ProviderResult<Arc<dyn EmbeddingModel>> {
        let built = self.build_options(metadata, options)?;
        self.provider
            .create_embedding_model(&metadata.definition, &metadata.config, built)
    }
}

/// 命名空间工厂注册表
#[derive(Default)]
pub struct NamespaceFactoryRegistry {
    factories: DashMap<String, Arc<dyn ModelFactory>>,
}

impl std::fmt::Debug for NamespaceFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceFactoryRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl NamespaceFactoryRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂
    ///
    /// 同命名空间重复注册为后写覆盖，记录日志；
    /// 之后对该命名空间的解析使用新工厂。
    pub fn register_factory(&self, namespace: impl Into<String>, factory: Arc<dyn ModelFactory>) {
        let namespace = namespace.into();
        if self.factories.insert(namespace.clone(), factory).is_some() {
            tracing::info!("命名空间 {} 的工厂被替换", namespace);
        }
    }

    /// 查找工厂
    pub fn get_factory(&self, namespace: &str) -> Option<Arc<dyn ModelFactory>> {
        self.factories.get(namespace).map(|f| Arc::clone(&f))
    }

    /// 移除工厂，返回是否存在
    pub fn remove_factory(&self, namespace: &str) -> bool {
        self.factories.remove(namespace).is_some()
    }

    /// 已注册的命名空间列表
    pub fn namespaces(&self) -> Vec<String> {
        self.factories.iter().map(|e| e.key().clone()).collect()
    }
}
