//! 插件校验
//!
//! 面向预览场景的非致命校验：所有缺陷累积在 `ValidationResult` 中一次性返回，
//! 单个坏字段不会中断整个校验过程。

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::parser::{DescriptorParser, PROVIDER_MANIFEST};
use super::types::{ModelDefinition, PluginDescriptor, PluginType, ProviderDescriptor};

/// 单条校验问题
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    /// 出问题的字段或位置
    pub field: String,
    /// 问题描述
    pub message: String,
}

impl ValidationIssue {
    /// 创建新的校验问题
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 校验结果（错误 + 警告累积器）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// 错误列表（阻止安装）
    pub errors: Vec<ValidationIssue>,
    /// 警告列表（不阻止安装）
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// 创建空结果
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个错误
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    /// 记录一个警告
    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// 是否通过（无错误）
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 插件校验器
///
/// 校验压缩包内容和解析后的描述符，永不抛错。
#[derive(Debug, Default)]
pub struct PluginValidator {
    parser: DescriptorParser,
}

impl PluginValidator {
    /// 创建新的校验器
    pub fn new() -> Self {
        Self {
            parser: DescriptorParser::new(),
        }
    }

    /// 校验压缩包（预览入口）
    ///
    /// 累积所有可发现的缺陷：包格式、清单必需字段、Provider 清单、
    /// 重复模型 ID。任何一步失败都不会中断后续检查。
    pub fn validate_archive(&self, archive_path: &Path) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = self.parser.detect_format(archive_path) {
            result.error("package", e.to_string());
            return result;
        }

        let manifest = match self.parser.read_raw_manifest(archive_path) {
            Ok(value) => value,
            Err(e) => {
                result.error("manifest", e.to_string());
                return result;
            }
        };

        self.validate_manifest_value(&manifest, &mut result);

        // model 类型插件必须携带 Provider 清单
        let is_model_plugin = manifest
            .get("plugin_type")
            .and_then(|v| v.as_str())
            .map(|t| t == "model")
            .unwrap_or(true);
        if is_model_plugin {
            match self.parser.parse_provider(archive_path) {
                Ok(provider) => {
                    self.validate_models(&provider, archive_path, &mut result);
                }
                Err(e) => {
                    result.error(PROVIDER_MANIFEST, e.to_string());
                }
            }
        }

        result
    }

    /// 校验清单必需字段
    fn validate_manifest_value(&self, manifest: &serde_json::Value, result: &mut ValidationResult) {
        for field in ["id", "version", "entry"] {
            match manifest.get(field).and_then(|v| v.as_str()) {
                Some(value) if !value.is_empty() => {}
                _ => result.error(field, format!("必需字段 {} 缺失或为空", field)),
            }
        }

        if let Some(id) = manifest.get("id").and_then(|v| v.as_str()) {
            if !id.is_empty() && !Self::is_valid_id(id) {
                result.error("id", "插件 ID 只能包含字母、数字、连字符和下划线");
            }
        }

        if manifest.get("name").and_then(|v| v.as_str()).is_none() {
            result.warning("name", "插件名称缺失，将使用 ID 作为名称");
        }
    }

    /// 校验模型定义（重复 ID、类型声明）
    fn validate_models(
        &self,
        provider: &ProviderDescriptor,
        archive_path: &Path,
        result: &mut ValidationResult,
    ) {
        let definitions = match self.parser.parse_model_definitions(provider, archive_path) {
            Ok(defs) => defs,
            Err(e) => {
                result.error("models", e.to_string());
                return;
            }
        };

        if definitions.is_empty() {
            result.warning("models", "插件未声明任何模型");
        }

        let mut seen = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.model_id.clone()) {
                result.error(
                    "models",
                    format!("重复的模型 ID: {}", definition.model_id),
                );
            }
            if !provider.supported_model_types.is_empty()
                && !provider.supported_model_types.contains(&definition.model_type)
            {
                result.warning(
                    "models",
                    format!(
                        "模型 {} 的类型 {} 不在 Provider 声明的支持列表中",
                        definition.model_id, definition.model_type
                    ),
                );
            }
        }
    }

    /// 校验已解析的描述符组合
    ///
    /// 安装流程在解析完成后调用，检查命名空间归属与重复模型 ID。
    pub fn validate_plugin(
        &self,
        plugin: &PluginDescriptor,
        provider: Option<&ProviderDescriptor>,
        models: &[ModelDefinition],
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if plugin.id.is_empty() {
            result.error("id", "必需字段 id 缺失或为空");
        } else if !Self::is_valid_id(&plugin.id) {
            result.error("id", "插件 ID 只能包含字母、数字、连字符和下划线");
        }
        if plugin.version.is_empty() {
            result.error("version", "必需字段 version 缺失或为空");
        }
        if plugin.entry.is_empty() {
            result.error("entry", "必需字段 entry 缺失或为空");
        }

        if plugin.plugin_type == PluginType::Model && provider.is_none() {
            result.error(PROVIDER_MANIFEST, "model 类型插件必须携带 Provider 清单");
        }

        let mut seen = HashSet::new();
        for definition in models {
            if !seen.insert(definition.model_id.clone()) {
                result.error("models", format!("重复的模型 ID: {}", definition.model_id));
            }
        }

        result
    }

    /// ID 字符集检查
    fn is_valid_id(id: &str) -> bool {
        id.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}
