//! 插件描述符类型定义
//!
//! 定义 PluginDescriptor、ProviderDescriptor、ModelDefinition 等解析产物。
//! 描述符在解析阶段创建，注册完成或安装失败后即丢弃，不做长期持有。

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 描述符解析错误
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// 包格式无效
    #[error("包格式无效: {0}")]
    InvalidPackage(String),

    /// 清单文件缺失
    #[error("清单文件缺失: {0}")]
    ManifestMissing(String),

    /// 清单解析失败
    #[error("清单解析失败: {0}")]
    ParseFailed(String),

    /// 必需字段缺失
    #[error("必需字段缺失: {0}")]
    MissingField(&'static str),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// 插件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// 模型 Provider 插件
    #[default]
    Model,
    /// 工具插件
    Tool,
    /// UI 扩展插件
    Ui,
    /// 工作流插件
    Workflow,
    /// 外部集成插件
    Integration,
    /// 其他
    Other,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginType::Model => write!(f, "model"),
            PluginType::Tool => write!(f, "tool"),
            PluginType::Ui => write!(f, "ui"),
            PluginType::Workflow => write!(f, "workflow"),
            PluginType::Integration => write!(f, "integration"),
            PluginType::Other => write!(f, "other"),
        }
    }
}

/// 模型类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// 对话模型
    Chat,
    /// 图像生成模型
    Image,
    /// 向量嵌入模型
    Embedding,
    /// 音频模型
    Audio,
    /// 多模态模型
    Multimodal,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Chat => write!(f, "chat"),
            ModelType::Image => write!(f, "image"),
            ModelType::Embedding => write!(f, "embedding"),
            ModelType::Audio => write!(f, "audio"),
            ModelType::Multimodal => write!(f, "multimodal"),
        }
    }
}

/// 模型特性标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFeature {
    /// 流式输出
    Streaming,
    /// 函数调用
    FunctionCalling,
    /// 图像理解
    Vision,
    /// 结构化输出
    StructuredOutput,
}

/// 按语言区分的文案 (locale -> 文本)
pub type LocalizedText = IndexMap<String, String>;

/// 插件描述符 (manifest.json)
///
/// 描述插件的身份、入口和声明的依赖/扩展。解析后不可变。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginDescriptor {
    /// 插件 ID（唯一）
    pub id: String,
    /// 插件名称
    pub name: String,
    /// 插件版本
    pub version: String,
    /// 作者
    #[serde(default)]
    pub author: Option<String>,
    /// 厂商
    #[serde(default)]
    pub vendor: Option<String>,
    /// 插件类型
    #[serde(default)]
    pub plugin_type: PluginType,
    /// 入口标识（Provider 构建器名称）
    pub entry: String,
    /// 本地化标题
    #[serde(default)]
    pub label: LocalizedText,
    /// 本地化描述
    #[serde(default)]
    pub description: LocalizedText,
    /// 图标引用（相对于插件目录）
    #[serde(default)]
    pub icon: Option<String>,
    /// 声明的依赖插件
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// 声明的扩展点
    #[serde(default)]
    pub extensions: Vec<String>,
    /// 创建时间
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Provider 描述符 (provider.json)
///
/// 一个 model 类型插件恰好拥有一个 ProviderDescriptor。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderDescriptor {
    /// Provider 代号，即命名空间（如 "openai"、"deepseek"）
    pub code: String,
    /// 本地化标题
    #[serde(default)]
    pub label: LocalizedText,
    /// 本地化描述
    #[serde(default)]
    pub description: LocalizedText,
    /// 图标引用
    #[serde(default)]
    pub icon: Option<String>,
    /// 小图标引用
    #[serde(default)]
    pub icon_small: Option<String>,
    /// 支持的模型类型
    #[serde(default)]
    pub supported_model_types: Vec<ModelType>,
    /// 声明式配置 schema (JSON Schema)
    #[serde(default)]
    pub config_schema: Option<serde_json::Value>,
    /// 凭证 schema (JSON Schema)
    #[serde(default)]
    pub credential_schema: Option<serde_json::Value>,
}

/// 参数取值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// 浮点数
    Float,
    /// 整数
    Int,
    /// 字符串
    String,
    /// 布尔
    Boolean,
    /// 多行文本
    Text,
}

/// 模型参数规则
///
/// 描述一个可调参数的约束（默认值、范围、可选项）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterRule {
    /// 参数名
    pub name: String,
    /// 参数类型
    pub param_type: ParamType,
    /// 默认值
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// 最小值（数值参数）
    #[serde(default)]
    pub min: Option<f64>,
    /// 最大值（数值参数）
    #[serde(default)]
    pub max: Option<f64>,
    /// 允许的取值列表
    #[serde(default)]
    pub options: Vec<serde_json::Value>,
    /// 是否必填
    #[serde(default)]
    pub required: bool,
}

/// 计价信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceInfo {
    /// 输入单价
    pub input: f64,
    /// 输出单价
    #[serde(default)]
    pub output: Option<f64>,
    /// 计价单位（如 "1M tokens"）
    pub unit: String,
    /// 货币
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// 模型定义 (models/*.json)
///
/// 插件内声明的单个可调用模型。model_id 在其命名空间内唯一。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDefinition {
    /// 模型 ID（命名空间内唯一）
    pub model_id: String,
    /// 模型类型
    pub model_type: ModelType,
    /// 本地化标题
    #[serde(default)]
    pub label: LocalizedText,
    /// 特性标记
    #[serde(default)]
    pub features: Vec<ModelFeature>,
    /// 自由属性（上下文长度等）
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
    /// 参数规则
    #[serde(default)]
    pub parameter_rules: Vec<ParameterRule>,
    /// 计价信息
    #[serde(default)]
    pub pricing: Option<PriceInfo>,
}

impl ModelDefinition {
    /// 是否声明了某个特性
    pub fn has_feature(&self, feature: ModelFeature) -> bool {
        self.features.contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_unknown_fields_are_ignored() {
        // 前向兼容：未知可选字段不影响解析
        let json = r#"{
            "id": "demo",
            "name": "Demo",
            "version": "1.0",
            "entry": "com.example.Provider",
            "future_field": {"nested": true}
        }"#;
        let descriptor: PluginDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.id, "demo");
        assert_eq!(descriptor.plugin_type, PluginType::Model);
        assert!(descriptor.dependencies.is_empty());
    }

    #[test]
    fn model_definition_defaults() {
        let json = r#"{"model_id": "demo-chat", "model_type": "chat"}"#;
        let def: ModelDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.model_type, ModelType::Chat);
        assert!(!def.has_feature(ModelFeature::Streaming));
        assert!(def.parameter_rules.is_empty());
    }

    #[test]
    fn plugin_type_serde_roundtrip() {
        let json = serde_json::to_string(&PluginType::Integration).unwrap();
        assert_eq!(json, "\"integration\"");
        let back: PluginType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PluginType::Integration);
    }
}
