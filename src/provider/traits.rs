//! Provider 能力契约
//!
//! 统一的 Provider 接口：按能力集 {chat, image, embedding} 多态，
//! 未实现的能力默认返回 Unsupported，而不是在加载期失败。

use async_trait::async_trait;
use futures::Stream;
use std::any::Any;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::{ModelDefinition, ModelType};

use super::types::{
    ChatChunk, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ImageRequest,
    ImageResponse, ModelConfig,
};

/// Provider 调用错误
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 上游调用失败
    #[error("上游调用失败: {0}")]
    Upstream(String),

    /// Provider 不支持该能力
    #[error("Provider {provider} 不支持 {capability} 能力")]
    Unsupported {
        /// Provider 命名空间
        provider: String,
        /// 请求的能力
        capability: ModelType,
    },

    /// 请求无效
    #[error("请求无效: {0}")]
    InvalidRequest(String),

    /// 配置无效
    #[error("配置无效: {0}")]
    InvalidConfig(String),

    /// 凭证解析失败
    #[error("凭证解析失败: {0}")]
    CredentialMissing(String),

    /// 调用被取消
    #[error("调用被取消")]
    Cancelled,

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// Provider 结果类型别名
pub type ProviderResult<T> = Result<T, ProviderError>;

/// 流式对话响应
pub type ChatStream = Pin<Box<dyn Stream<Item = ProviderResult<ChatChunk>> + Send>>;

/// Provider 特定的强类型调用选项
///
/// 由 Options Handler 从键值配置构建，Provider 内部按需下转。
pub trait ProviderOptions: std::fmt::Debug + Send + Sync {
    /// 下转用的 Any 引用
    fn as_any(&self) -> &dyn Any;
}

/// 装箱的调用选项
pub type BoxedOptions = Box<dyn ProviderOptions>;

/// 可调用的对话模型客户端
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 完整模型 ID (`namespace:modelId`)
    fn model_id(&self) -> &str;

    /// 单次对话
    async fn chat(&self, request: ChatRequest) -> ProviderResult<ChatResponse>;

    /// 流式对话
    ///
    /// 返回惰性分片序列；消费方 drop 流即取消上游调用。
    fn chat_stream(&self, request: ChatRequest) -> ChatStream;
}

impl std::fmt::Debug for dyn ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("model_id", &self.model_id())
            .finish()
    }
}

/// 可调用的图像生成模型客户端
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// 完整模型 ID
    fn model_id(&self) -> &str;

    /// 生成图像
    async fn generate(&self, request: ImageRequest) -> ProviderResult<ImageResponse>;
}

impl std::fmt::Debug for dyn ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageModel")
            .field("model_id", &self.model_id())
            .finish()
    }
}

/// 可调用的向量嵌入模型客户端
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// 完整模型 ID
    fn model_id(&self) -> &str;

    /// 计算嵌入向量
    async fn embed(&self, request: EmbeddingRequest) -> ProviderResult<EmbeddingResponse>;
}

/// Provider 能力契约
///
/// 插件入口构建出的 Provider 实例必须实现该 trait。
/// create_* 默认拒绝，Provider 只需覆盖自己支持的能力。
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider 命名空间
    fn namespace(&self) -> &str;

    /// 创建对话模型客户端
    fn create_chat_model(
        &self,
        _definition: &ModelDefinition,
        _config: &ModelConfig,
        _options: Option<BoxedOptions>,
    ) -> ProviderResult<Arc<dyn ChatModel>> {
        Err(ProviderError::Unsupported {
            provider: self.namespace().to_string(),
            capability: ModelType::Chat,
        })
    }

    /// 创建图像生成模型客户端
    fn create_image_model(
        &self,
        _definition: &ModelDefinition,
        _config: &ModelConfig,
        _options: Option<BoxedOptions>,
    ) -> ProviderResult<Arc<dyn ImageModel>> {
        Err(ProviderError::Unsupported {
            provider: self.namespace().to_string(),
            capability: ModelType::Image,
        })
    }

    /// 创建向量嵌入模型客户端
    fn create_embedding_model(
        &self,
        _definition: &ModelDefinition,
        _config: &ModelConfig,
        _options: Option<BoxedOptions>,
    ) -> ProviderResult<Arc<dyn EmbeddingModel>> {
        Err(ProviderError::Unsupported {
            provider: self.namespace().to_string(),
            capability: ModelType::Embedding,
        })
    }

    /// 校验 Provider 级配置
    fn validate_config(&self, _config: &ModelConfig) -> ProviderResult<()> {
        Ok(())
    }

    /// 连通性测试
    async fn test_connection(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// Provider 支持的模型类型
    fn supported_model_types(&self) -> Vec<ModelType> {
        vec![ModelType::Chat]
    }
}

impl std::fmt::Debug for dyn ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("namespace", &self.namespace())
            .finish()
    }
}
