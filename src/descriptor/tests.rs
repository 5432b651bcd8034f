//! 描述符模块测试
//!
//! 覆盖包格式检测、清单解析与非致命校验。

use std::fs::File;
use std::io::Write;

use super::*;
use crate::test_support::{
    demo_archive, demo_chat_model, demo_manifest, demo_provider, write_targz_archive,
    write_zip_archive,
};

#[test]
fn parse_demo_plugin_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let archive = demo_archive(dir.path());

    let parser = DescriptorParser::new();
    let descriptor = parser.parse_plugin(&archive).unwrap();

    assert_eq!(descriptor.id, "demo");
    assert_eq!(descriptor.version, "1.0");
    assert_eq!(descriptor.entry, "com.example.Provider");
    assert_eq!(descriptor.plugin_type, PluginType::Model);
}

#[test]
fn parse_provider_and_models() {
    let dir = tempfile::tempdir().unwrap();
    let archive = demo_archive(dir.path());

    let parser = DescriptorParser::new();
    let provider = parser.parse_provider(&archive).unwrap();
    assert_eq!(provider.code, "demo");
    assert_eq!(
        provider.supported_model_types,
        vec![ModelType::Chat, ModelType::Embedding]
    );

    let models = parser.parse_model_definitions(&provider, &archive).unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].model_id, "demo-chat");
    assert_eq!(models[0].model_type, ModelType::Chat);
    assert!(models[0].has_feature(ModelFeature::Streaming));
}

#[test]
fn parse_from_targz() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_targz_archive(
        dir.path(),
        "demo-1.0.tar.gz",
        &[
            ("manifest.json", demo_manifest()),
            ("provider.json", demo_provider()),
            ("models/demo-chat.json", demo_chat_model()),
        ],
    );

    let parser = DescriptorParser::new();
    assert_eq!(parser.detect_format(&archive).unwrap(), PackageFormat::TarGz);
    let descriptor = parser.parse_plugin(&archive).unwrap();
    assert_eq!(descriptor.id, "demo");

    let provider = parser.parse_provider(&archive).unwrap();
    let models = parser.parse_model_definitions(&provider, &archive).unwrap();
    assert_eq!(models.len(), 1);
}

#[test]
fn detect_format_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake.zip");
    let mut file = File::create(&path).unwrap();
    file.write_all(b"this is not a zip file").unwrap();

    let parser = DescriptorParser::new();
    let err = parser.detect_format(&path).unwrap_err();
    assert!(matches!(err, DescriptorError::InvalidPackage(_)));
}

#[test]
fn detect_format_rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugin.rar");
    File::create(&path).unwrap().write_all(b"xx").unwrap();

    let parser = DescriptorParser::new();
    assert!(parser.detect_format(&path).is_err());
}

#[test]
fn missing_manifest_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_zip_archive(dir.path(), "empty.zip", &[("readme.txt", "hi")]);

    let parser = DescriptorParser::new();
    let err = parser.parse_plugin(&archive).unwrap_err();
    assert!(matches!(err, DescriptorError::ManifestMissing(_)));
}

#[test]
fn missing_required_field_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_zip_archive(
        dir.path(),
        "noid.zip",
        &[(
            "manifest.json",
            r#"{"id": "", "name": "x", "version": "1.0", "entry": "e"}"#,
        )],
    );

    let parser = DescriptorParser::new();
    let err = parser.parse_plugin(&archive).unwrap_err();
    assert!(matches!(err, DescriptorError::MissingField("id")));
}

#[test]
fn validate_demo_archive_has_no_errors() {
    let dir = tempfile::tempdir().unwrap();
    let archive = demo_archive(dir.path());

    let validator = PluginValidator::new();
    let result = validator.validate_archive(&archive);
    assert!(result.is_valid(), "errors: {:?}", result.errors);
}

#[test]
fn validation_accumulates_independent_defects() {
    // 两个独立缺陷（version 缺失 + 重复模型 ID）必须同时出现在结果中
    let dir = tempfile::tempdir().unwrap();
    let archive = write_zip_archive(
        dir.path(),
        "broken.zip",
        &[
            (
                "manifest.json",
                r#"{"id": "demo", "name": "Demo", "plugin_type": "model", "entry": "com.example.Provider"}"#,
            ),
            ("provider.json", demo_provider()),
            ("models/a.json", demo_chat_model()),
            ("models/b.json", demo_chat_model()),
        ],
    );

    let validator = PluginValidator::new();
    let result = validator.validate_archive(&archive);

    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|i| i.field == "version"));
    assert!(result
        .errors
        .iter()
        .any(|i| i.field == "models" && i.message.contains("demo-chat")));
}

#[test]
fn validation_never_panics_on_corrupt_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.zip");
    File::create(&path).unwrap().write_all(b"PK\x03\x04junk").unwrap();

    let validator = PluginValidator::new();
    let result = validator.validate_archive(&path);
    assert!(!result.is_valid());
}

#[test]
fn validate_plugin_checks_duplicate_models() {
    let validator = PluginValidator::new();
    let plugin: PluginDescriptor = serde_json::from_str(demo_manifest()).unwrap();
    let provider: ProviderDescriptor = serde_json::from_str(demo_provider()).unwrap();
    let model: ModelDefinition = serde_json::from_str(demo_chat_model()).unwrap();

    let result = validator.validate_plugin(&plugin, Some(&provider), &[model.clone(), model]);
    assert!(!result.is_valid());
    assert!(result.errors[0].message.contains("重复的模型 ID"));
}

#[test]
fn validate_plugin_requires_provider_for_model_type() {
    let validator = PluginValidator::new();
    let plugin: PluginDescriptor = serde_json::from_str(demo_manifest()).unwrap();

    let result = validator.validate_plugin(&plugin, None, &[]);
    assert!(!result.is_valid());
}
