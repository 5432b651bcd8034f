//! 测试辅助工具
//!
//! 构造测试用插件压缩包，并提供一个最小的 Echo Provider。

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use zip::write::FileOptions;

use crate::descriptor::{ModelDefinition, ModelType};
use crate::loader::ProviderBuilder;
use crate::provider::{
    BoxedOptions, ChatChunk, ChatModel, ChatRequest, ChatResponse, ChatStream, EmbeddingModel,
    EmbeddingRequest, EmbeddingResponse, ModelConfig, ModelProvider, ProviderResult, Role, Usage,
};

/// 在指定目录下写出一个 ZIP 插件包
pub fn write_zip_archive(dir: &Path, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// 在指定目录下写出一个 tar.gz 插件包
pub fn write_targz_archive(dir: &Path, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).unwrap();
    let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(enc);
    for (name, content) in entries {
        let data = content.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, *name, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
    path
}

/// 标准 demo 插件的清单内容
pub fn demo_manifest() -> &'static str {
    r#"{
        "id": "demo",
        "name": "Demo Provider",
        "version": "1.0",
        "plugin_type": "model",
        "entry": "com.example.Provider"
    }"#
}

/// 标准 demo 插件的 Provider 清单内容
pub fn demo_provider() -> &'static str {
    r#"{
        "code": "demo",
        "supported_model_types": ["chat", "embedding"]
    }"#
}

/// 标准 demo 插件的 chat 模型定义
pub fn demo_chat_model() -> &'static str {
    r#"{
        "model_id": "demo-chat",
        "model_type": "chat",
        "features": ["streaming"]
    }"#
}

/// 构造标准 demo 插件包（manifest + provider + 一个 chat 模型）
pub fn demo_archive(dir: &Path) -> PathBuf {
    write_zip_archive(
        dir,
        "demo-1.0.zip",
        &[
            ("manifest.json", demo_manifest()),
            ("provider.json", demo_provider()),
            ("models/demo-chat.json", demo_chat_model()),
        ],
    )
}

/// 最小化的测试 Provider：原样回显最后一条用户消息
pub struct EchoProvider {
    namespace: String,
}

impl EchoProvider {
    /// 指定命名空间创建
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ModelProvider for EchoProvider {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn create_chat_model(
        &self,
        definition: &ModelDefinition,
        _config: &ModelConfig,
        _options: Option<BoxedOptions>,
    ) -> ProviderResult<Arc<dyn ChatModel>> {
        Ok(Arc::new(EchoChatModel {
            full_id: format!("{}:{}", self.namespace, definition.model_id),
        }))
    }

    fn create_embedding_model(
        &self,
        definition: &ModelDefinition,
        _config: &ModelConfig,
        _options: Option<BoxedOptions>,
    ) -> ProviderResult<Arc<dyn EmbeddingModel>> {
        Ok(Arc::new(EchoEmbeddingModel {
            full_id: format!("{}:{}", self.namespace, definition.model_id),
        }))
    }

    fn supported_model_types(&self) -> Vec<ModelType> {
        vec![ModelType::Chat, ModelType::Embedding]
    }
}

/// Echo 对话模型
pub struct EchoChatModel {
    full_id: String,
}

impl EchoChatModel {
    fn echo_text(request: &ChatRequest) -> String {
        request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for EchoChatModel {
    fn model_id(&self) -> &str {
        &self.full_id
    }

    async fn chat(&self, request: ChatRequest) -> ProviderResult<ChatResponse> {
        let content = Self::echo_text(&request);
        Ok(ChatResponse {
            id: "echo-1".to_string(),
            model: self.full_id.clone(),
            content,
            finish_reason: Some("stop".to_string()),
            usage: Usage::default(),
        })
    }

    fn chat_stream(&self, request: ChatRequest) -> ChatStream {
        let full_id = self.full_id.clone();
        let content = Self::echo_text(&request);
        Box::pin(async_stream::stream! {
            yield Ok(ChatChunk::MessageStart {
                id: "echo-1".to_string(),
                model: full_id,
            });
            for piece in content.split_inclusive(' ') {
                yield Ok(ChatChunk::TextDelta {
                    text: piece.to_string(),
                });
            }
            yield Ok(ChatChunk::MessageStop {
                finish_reason: Some("stop".to_string()),
                usage: Usage::default(),
            });
        })
    }
}

/// Echo 嵌入模型：返回定长零向量
pub struct EchoEmbeddingModel {
    full_id: String,
}

#[async_trait]
impl EmbeddingModel for EchoEmbeddingModel {
    fn model_id(&self) -> &str {
        &self.full_id
    }

    async fn embed(&self, request: EmbeddingRequest) -> ProviderResult<EmbeddingResponse> {
        Ok(EmbeddingResponse {
            model: self.full_id.clone(),
            vectors: request.inputs.iter().map(|_| vec![0.0; 4]).collect(),
            usage: Usage::default(),
        })
    }
}

/// Echo Provider 的构建器（注册到 ProviderBuilderRegistry）
pub fn echo_builder() -> ProviderBuilder {
    Arc::new(|_plugin, descriptor| {
        let provider: Arc<dyn ModelProvider> = Arc::new(EchoProvider::new(descriptor.code.clone()));
        Ok(provider)
    })
}
