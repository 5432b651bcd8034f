//! Provider 调用类型定义
//!
//! 定义模型调用的请求 / 响应 / 流式分片类型，以及挂接到
//! 注册表记录上的 ModelConfig。分片类型作为统一的中间表示，
//! 各 Provider 把自家上游的流式格式归一到这里。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 模型运行配置
///
/// 端点、凭证引用与数值上限。凭证引用是不透明字符串，
/// 由外部凭证服务解析。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// 上游端点
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 凭证引用（不透明，交由 CredentialResolver 解析）
    #[serde(default)]
    pub credential_ref: Option<String>,
    /// 最大输出 token 数
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// 最大输入 token 数
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    /// Provider 级超时（秒），注册表与缓存不做统一超时
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 透传给 Options Handler 的自由配置
    #[serde(default)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// 凭证解析接口（外部协作方）
///
/// 核心只持有凭证引用，不接触真实密钥存储。
pub trait CredentialResolver: Send + Sync {
    /// 解析凭证引用，未找到返回 None
    fn resolve(&self, reference: &str) -> Option<String>;
}

/// 静态表凭证解析器（测试与嵌入场景）
#[derive(Debug, Default)]
pub struct StaticCredentialResolver {
    secrets: HashMap<String, String>,
}

impl StaticCredentialResolver {
    /// 创建空解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条凭证
    pub fn with_secret(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(reference.into(), value.into());
        self
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, reference: &str) -> Option<String> {
        self.secrets.get(reference).cloned()
    }
}

/// 共享的凭证解析器句柄
pub type SharedCredentialResolver = Arc<dyn CredentialResolver>;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 系统提示
    System,
    /// 用户输入
    User,
    /// 模型输出
    Assistant,
    /// 工具结果
    Tool,
}

/// 对话消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// 角色
    pub role: Role,
    /// 文本内容
    pub content: String,
}

impl ChatMessage {
    /// 构造用户消息
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// 构造系统消息
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// 构造模型消息
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 对话请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// 请求指定的模型 ID（可缺省，由路由层解析）
    #[serde(default)]
    pub model: Option<String>,
    /// 消息列表
    pub messages: Vec<ChatMessage>,
    /// 生成参数（键值配置，交由 Options Handler 转换）
    #[serde(default)]
    pub options: IndexMap<String, serde_json::Value>,
}

/// token 用量
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    /// 输入 token 数
    pub input_tokens: u64,
    /// 输出 token 数
    pub output_tokens: u64,
}

/// 对话响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// 响应 ID
    pub id: String,
    /// 实际执行的完整模型 ID
    pub model: String,
    /// 生成文本
    pub content: String,
    /// 结束原因
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// 用量
    #[serde(default)]
    pub usage: Usage,
}

/// 流式对话分片
///
/// 惰性、有限、不可重放的序列；消费方中止后上游资源随流释放。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatChunk {
    /// 消息开始
    MessageStart {
        /// 消息 ID
        id: String,
        /// 模型名称
        model: String,
    },
    /// 文本增量
    TextDelta {
        /// 文本内容
        text: String,
    },
    /// 工具调用开始
    ToolUseStart {
        /// 工具调用 ID
        id: String,
        /// 工具名称
        name: String,
    },
    /// 工具调用参数增量（部分 JSON）
    ToolUseInputDelta {
        /// 工具调用 ID
        id: String,
        /// 参数增量
        partial_json: String,
    },
    /// 工具调用结束
    ToolUseStop {
        /// 工具调用 ID
        id: String,
    },
    /// 消息结束
    MessageStop {
        /// 结束原因
        finish_reason: Option<String>,
        /// 用量
        usage: Usage,
    },
}

/// 图像生成请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    /// 请求指定的模型 ID
    #[serde(default)]
    pub model: Option<String>,
    /// 提示词
    pub prompt: String,
    /// 尺寸（如 "1024x1024"）
    #[serde(default)]
    pub size: Option<String>,
    /// 生成数量
    #[serde(default = "default_image_count")]
    pub count: u32,
    /// 生成参数
    #[serde(default)]
    pub options: IndexMap<String, serde_json::Value>,
}

fn default_image_count() -> u32 {
    1
}

/// 生成的单张图像
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageData {
    /// 图像 URL
    Url(String),
    /// base64 编码的图像字节
    Base64(String),
}

/// 图像生成响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    /// 实际执行的完整模型 ID
    pub model: String,
    /// 生成结果
    pub images: Vec<ImageData>,
}

/// 向量嵌入请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// 请求指定的模型 ID
    #[serde(default)]
    pub model: Option<String>,
    /// 输入文本列表
    pub inputs: Vec<String>,
    /// 生成参数
    #[serde(default)]
    pub options: IndexMap<String, serde_json::Value>,
}

/// 向量嵌入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// 实际执行的完整模型 ID
    pub model: String,
    /// 向量结果，与输入一一对应
    pub vectors: Vec<Vec<f32>>,
    /// 用量
    #[serde(default)]
    pub usage: Usage,
}
