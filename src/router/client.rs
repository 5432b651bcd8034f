//! 委托路由客户端
//!
//! 调用方提供（可能缺省、可能不带命名空间的）模型 ID，
//! 客户端解析为完整 ID 后委托给缓存里的真实实例。
//! 解析顺序：缺省 → 默认模型；裸 ID → 默认命名空间补全；
//! 未知 ID → 回退默认模型；默认模型也未知 → 报错。

use std::sync::Arc;

use crate::provider::{
    ChatRequest, ChatResponse, ChatStream, EmbeddingRequest, EmbeddingResponse, ImageRequest,
    ImageResponse,
};
use crate::registry::{ModelRegistry, ResolveError};

use super::cache::ModelInstanceCache;

/// 路由配置
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RouterConfig {
    /// 默认模型（完整 ID），请求未指定或指定未知模型时回退
    #[serde(default)]
    pub default_model: Option<String>,
    /// 默认命名空间，补全不带命名空间的裸模型 ID
    #[serde(default)]
    pub default_namespace: Option<String>,
}

/// 模型调用客户端
///
/// 进程内推荐的模型调用入口，持有注册表与实例缓存的句柄。
pub struct ModelClient {
    registry: Arc<ModelRegistry>,
    cache: Arc<ModelInstanceCache>,
    config: RouterConfig,
}

impl ModelClient {
    /// 创建客户端
    pub fn new(
        registry: Arc<ModelRegistry>,
        cache: Arc<ModelInstanceCache>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    /// 把请求里的模型 ID 解析为注册表中存在的完整 ID
    pub fn resolve_model_id(&self, requested: Option<&str>) -> Result<String, ResolveError> {
        let requested = requested.filter(|s| !s.is_empty());
        let full_id = match requested {
            None => {
                return self
                    .config
                    .default_model
                    .clone()
                    .filter(|d| self.registry.contains_model(d))
                    .ok_or(ResolveError::NoDefaultModel);
            }
            Some(id) if id.contains(':') => id.to_string(),
            Some(bare) => match &self.config.default_namespace {
                Some(ns) => format!("{}:{}", ns, bare),
                None => return Err(ResolveError::InvalidModelId(bare.to_string())),
            },
        };

        if self.registry.contains_model(&full_id) {
            return Ok(full_id);
        }

        // 未知模型回退默认模型；默认模型也无效时按终态报错
        match &self.config.default_model {
            Some(default) if self.registry.contains_model(default) => {
                tracing::warn!("模型 {} 未注册，回退默认模型 {}", full_id, default);
                Ok(default.clone())
            }
            Some(_) => Err(ResolveError::NoDefaultModel),
            None => Err(ResolveError::ModelNotFound(full_id)),
        }
    }

    /// 模型当前是否可调用
    pub fn is_model_available(&self, full_id: &str) -> bool {
        self.registry.is_model_available(full_id)
    }

    /// 非流式对话
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ResolveError> {
        let full_id = self.resolve_model_id(request.model.as_deref())?;
        let model = self.cache.chat_model(&full_id).await?;
        Ok(model.chat(request).await?)
    }

    /// 流式对话
    ///
    /// 返回的流在被丢弃时即视为取消，底层 Provider 的请求随之中止。
    pub async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ResolveError> {
        let full_id = self.resolve_model_id(request.model.as_deref())?;
        let model = self.cache.chat_model(&full_id).await?;
        Ok(model.chat_stream(request))
    }

    /// 图像生成
    pub async fn generate_image(
        &self,
        model: Option<&str>,
        request: ImageRequest,
    ) -> Result<ImageResponse, ResolveError> {
        let full_id = self.resolve_model_id(model)?;
        let instance = self.cache.image_model(&full_id).await?;
        Ok(instance.generate(request).await?)
    }

    /// 向量嵌入
    pub async fn embedding(
        &self,
        model: Option<&str>,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ResolveError> {
        let full_id = self.resolve_model_id(model)?;
        let instance = self.cache.embedding_model(&full_id).await?;
        Ok(instance.embed(request).await?)
    }
}
