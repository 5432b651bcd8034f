//! 描述符模块
//!
//! 插件压缩包的解析与校验：
//! - 包格式检测与完整性验证
//! - 清单解码（插件 / Provider / 模型定义）
//! - 面向预览的非致命校验

mod parser;
mod types;
mod validation;

pub use parser::{DescriptorParser, PackageFormat, MODELS_PREFIX, PLUGIN_MANIFEST, PROVIDER_MANIFEST};
pub use types::{
    DescriptorError, LocalizedText, ModelDefinition, ModelFeature, ModelType, ParamType,
    ParameterRule, PluginDescriptor, PluginType, PriceInfo, ProviderDescriptor,
};
pub use validation::{PluginValidator, ValidationIssue, ValidationResult};

#[cfg(test)]
mod tests;
