//! Provider 模块
//!
//! 模型 Provider 的能力契约与调用类型：
//! - ModelProvider / ChatModel / ImageModel / EmbeddingModel trait
//! - 请求 / 响应 / 流式分片类型
//! - ModelConfig 与凭证解析接口

mod traits;
mod types;

pub use traits::{
    BoxedOptions, ChatModel, ChatStream, EmbeddingModel, ImageModel, ModelProvider,
    ProviderError, ProviderOptions, ProviderResult,
};
pub use types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, CredentialResolver, EmbeddingRequest,
    EmbeddingResponse, ImageData, ImageRequest, ImageResponse, ModelConfig, Role,
    SharedCredentialResolver, StaticCredentialResolver, Usage,
};
