//! 描述符解析器
//!
//! 从插件压缩包 (zip/tar.gz) 中读取清单并解码为内存描述符。
//! 解析是纯解码步骤：不加载任何代码、不产生读字节之外的副作用，
//! 因此可以在正式安装前反复调用做预览。
//!
//! 主要功能：
//! - 包格式检测（扩展名 + 魔数 + 完整性遍历）
//! - manifest.json -> PluginDescriptor
//! - provider.json -> ProviderDescriptor
//! - models/*.json -> Vec<ModelDefinition>

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::types::{DescriptorError, ModelDefinition, PluginDescriptor, ProviderDescriptor};

/// 插件清单文件名
pub const PLUGIN_MANIFEST: &str = "manifest.json";
/// Provider 清单文件名
pub const PROVIDER_MANIFEST: &str = "provider.json";
/// 模型定义目录前缀
pub const MODELS_PREFIX: &str = "models/";

/// 包格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    /// ZIP 压缩包
    Zip,
    /// tar.gz 压缩包
    TarGz,
}

impl PackageFormat {
    /// 从扩展名检测格式
    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(PackageFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(PackageFormat::TarGz)
        } else {
            None
        }
    }
}

/// 描述符解析器
///
/// 所有方法对同一压缩包可重复调用，互不影响。
#[derive(Debug, Default)]
pub struct DescriptorParser;

impl DescriptorParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self
    }

    /// 检测并校验包格式
    ///
    /// 检查扩展名、文件魔数，并完整遍历压缩包条目以确认未损坏。
    pub fn detect_format(&self, path: &Path) -> Result<PackageFormat, DescriptorError> {
        if !path.exists() {
            return Err(DescriptorError::InvalidPackage(format!(
                "文件不存在: {}",
                path.display()
            )));
        }

        let metadata = std::fs::metadata(path)?;
        if metadata.len() == 0 {
            return Err(DescriptorError::InvalidPackage("文件为空".to_string()));
        }

        let format = PackageFormat::from_extension(path).ok_or_else(|| {
            DescriptorError::InvalidPackage(format!(
                "不支持的包格式，仅支持 .zip 和 .tar.gz: {}",
                path.display()
            ))
        })?;

        self.validate_magic_bytes(path, format)?;
        self.validate_archive_integrity(path, format)?;

        Ok(format)
    }

    /// 验证文件魔数
    fn validate_magic_bytes(
        &self,
        path: &Path,
        format: PackageFormat,
    ) -> Result<(), DescriptorError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 4];

        reader
            .read_exact(&mut magic)
            .map_err(|e| DescriptorError::InvalidPackage(format!("无法读取文件头: {}", e)))?;

        match format {
            PackageFormat::Zip => {
                // ZIP 魔数: PK\x03\x04 或 PK\x05\x06 (空压缩包)
                if magic[0..2] != [0x50, 0x4B] {
                    return Err(DescriptorError::InvalidPackage(
                        "无效的 ZIP 文件格式".to_string(),
                    ));
                }
            }
            PackageFormat::TarGz => {
                // Gzip 魔数: \x1f\x8b
                if magic[0..2] != [0x1f, 0x8b] {
                    return Err(DescriptorError::InvalidPackage(
                        "无效的 tar.gz 文件格式".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// 验证压缩包完整性
    fn validate_archive_integrity(
        &self,
        path: &Path,
        format: PackageFormat,
    ) -> Result<(), DescriptorError> {
        match format {
            PackageFormat::Zip => {
                let file = File::open(path)?;
                let mut archive = zip::ZipArchive::new(file).map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e))
                })?;

                if archive.len() == 0 {
                    return Err(DescriptorError::InvalidPackage(
                        "ZIP 压缩包为空".to_string(),
                    ));
                }

                for i in 0..archive.len() {
                    let entry = archive.by_index(i).map_err(|e| {
                        DescriptorError::InvalidPackage(format!(
                            "ZIP 文件损坏，无法读取条目 {}: {}",
                            i, e
                        ))
                    })?;
                    if entry.name().is_empty() {
                        return Err(DescriptorError::InvalidPackage(format!(
                            "ZIP 条目 {} 的文件名无效",
                            i
                        )));
                    }
                }
            }
            PackageFormat::TarGz => {
                let file = File::open(path)?;
                let gz = flate2::read::GzDecoder::new(file);
                let mut archive = tar::Archive::new(gz);

                let mut entry_count = 0;
                for entry in archive.entries().map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 tar.gz 文件: {}", e))
                })? {
                    let entry = entry.map_err(|e| {
                        DescriptorError::InvalidPackage(format!("tar.gz 文件损坏: {}", e))
                    })?;
                    let path = entry.path().map_err(|e| {
                        DescriptorError::InvalidPackage(format!("tar.gz 条目路径无效: {}", e))
                    })?;
                    if path.to_string_lossy().is_empty() {
                        return Err(DescriptorError::InvalidPackage(
                            "tar.gz 条目路径为空".to_string(),
                        ));
                    }
                    entry_count += 1;
                }

                if entry_count == 0 {
                    return Err(DescriptorError::InvalidPackage(
                        "tar.gz 压缩包为空".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// 读取压缩包内单个条目的文本内容
    ///
    /// 条目不存在时返回 `Ok(None)`。
    pub fn read_entry(&self, archive_path: &Path, name: &str) -> Result<Option<String>, DescriptorError> {
        let format = self.detect_format(archive_path)?;
        match format {
            PackageFormat::Zip => {
                let file = File::open(archive_path)?;
                let mut archive = zip::ZipArchive::new(file).map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e))
                })?;
                let result = match archive.by_name(name) {
                    Ok(mut entry) => {
                        let mut content = String::new();
                        entry.read_to_string(&mut content)?;
                        Ok(Some(content))
                    }
                    Err(zip::result::ZipError::FileNotFound) => Ok(None),
                    Err(e) => Err(DescriptorError::InvalidPackage(format!(
                        "无法读取 ZIP 条目 {}: {}",
                        name, e
                    ))),
                };
                result
            }
            PackageFormat::TarGz => {
                let file = File::open(archive_path)?;
                let gz = flate2::read::GzDecoder::new(file);
                let mut archive = tar::Archive::new(gz);
                for entry in archive.entries().map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 tar.gz 文件: {}", e))
                })? {
                    let mut entry = entry.map_err(|e| {
                        DescriptorError::InvalidPackage(format!("tar.gz 文件损坏: {}", e))
                    })?;
                    let entry_path = entry
                        .path()
                        .map_err(|e| {
                            DescriptorError::InvalidPackage(format!("tar.gz 条目路径无效: {}", e))
                        })?
                        .to_string_lossy()
                        .to_string();
                    if entry_path == name || entry_path == format!("./{}", name) {
                        let mut content = String::new();
                        entry.read_to_string(&mut content)?;
                        return Ok(Some(content));
                    }
                }
                Ok(None)
            }
        }
    }

    /// 列出压缩包内所有条目名
    pub fn list_entries(&self, archive_path: &Path) -> Result<Vec<String>, DescriptorError> {
        let format = self.detect_format(archive_path)?;
        let mut names = Vec::new();
        match format {
            PackageFormat::Zip => {
                let file = File::open(archive_path)?;
                let mut archive = zip::ZipArchive::new(file).map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e))
                })?;
                for i in 0..archive.len() {
                    let entry = archive.by_index(i).map_err(|e| {
                        DescriptorError::InvalidPackage(format!("ZIP 条目 {} 损坏: {}", i, e))
                    })?;
                    names.push(entry.name().to_string());
                }
            }
            PackageFormat::TarGz => {
                let file = File::open(archive_path)?;
                let gz = flate2::read::GzDecoder::new(file);
                let mut archive = tar::Archive::new(gz);
                for entry in archive.entries().map_err(|e| {
                    DescriptorError::InvalidPackage(format!("无法读取 tar.gz 文件: {}", e))
                })? {
                    let entry = entry.map_err(|e| {
                        DescriptorError::InvalidPackage(format!("tar.gz 文件损坏: {}", e))
                    })?;
                    let entry_path = entry.path().map_err(|e| {
                        DescriptorError::InvalidPackage(format!("tar.gz 条目路径无效: {}", e))
                    })?;
                    let name = entry_path.to_string_lossy();
                    names.push(name.strip_prefix("./").unwrap_or(&name).to_string());
                }
            }
        }
        Ok(names)
    }

    /// 读取插件清单原始 JSON（供预览校验使用）
    pub fn read_raw_manifest(
        &self,
        archive_path: &Path,
    ) -> Result<serde_json::Value, DescriptorError> {
        let content = self
            .read_entry(archive_path, PLUGIN_MANIFEST)?
            .ok_or_else(|| DescriptorError::ManifestMissing(PLUGIN_MANIFEST.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| DescriptorError::ParseFailed(format!("{}: {}", PLUGIN_MANIFEST, e)))
    }

    /// 解析插件描述符 (manifest.json)
    pub fn parse_plugin(&self, archive_path: &Path) -> Result<PluginDescriptor, DescriptorError> {
        let content = self
            .read_entry(archive_path, PLUGIN_MANIFEST)?
            .ok_or_else(|| DescriptorError::ManifestMissing(PLUGIN_MANIFEST.to_string()))?;
        let descriptor: PluginDescriptor = serde_json::from_str(&content)
            .map_err(|e| DescriptorError::ParseFailed(format!("{}: {}", PLUGIN_MANIFEST, e)))?;

        // 空字符串与缺失同等对待
        if descriptor.id.is_empty() {
            return Err(DescriptorError::MissingField("id"));
        }
        if descriptor.version.is_empty() {
            return Err(DescriptorError::MissingField("version"));
        }
        if descriptor.entry.is_empty() {
            return Err(DescriptorError::MissingField("entry"));
        }

        Ok(descriptor)
    }

    /// 解析 Provider 描述符 (provider.json)
    pub fn parse_provider(
        &self,
        archive_path: &Path,
    ) -> Result<ProviderDescriptor, DescriptorError> {
        self.parse_provider_at(PROVIDER_MANIFEST, archive_path)
    }

    /// 从指定条目解析 Provider 描述符
    pub fn parse_provider_at(
        &self,
        manifest_entry: &str,
        archive_path: &Path,
    ) -> Result<ProviderDescriptor, DescriptorError> {
        let content = self
            .read_entry(archive_path, manifest_entry)?
            .ok_or_else(|| DescriptorError::ManifestMissing(manifest_entry.to_string()))?;
        let descriptor: ProviderDescriptor = serde_json::from_str(&content)
            .map_err(|e| DescriptorError::ParseFailed(format!("{}: {}", manifest_entry, e)))?;

        if descriptor.code.is_empty() {
            return Err(DescriptorError::MissingField("code"));
        }

        Ok(descriptor)
    }

    /// 解析插件内声明的全部模型定义 (models/*.json)
    ///
    /// 条目按名称排序，保证解析结果稳定。
    pub fn parse_model_definitions(
        &self,
        provider: &ProviderDescriptor,
        archive_path: &Path,
    ) -> Result<Vec<ModelDefinition>, DescriptorError> {
        let mut entries: Vec<String> = self
            .list_entries(archive_path)?
            .into_iter()
            .filter(|name| name.starts_with(MODELS_PREFIX) && name.ends_with(".json"))
            .collect();
        entries.sort();

        let mut definitions = Vec::with_capacity(entries.len());
        for name in entries {
            let content = self
                .read_entry(archive_path, &name)?
                .ok_or_else(|| DescriptorError::ManifestMissing(name.clone()))?;
            let definition: ModelDefinition = serde_json::from_str(&content)
                .map_err(|e| DescriptorError::ParseFailed(format!("{}: {}", name, e)))?;

            if definition.model_id.is_empty() {
                return Err(DescriptorError::MissingField("model_id"));
            }
            if !provider.supported_model_types.is_empty()
                && !provider.supported_model_types.contains(&definition.model_type)
            {
                tracing::warn!(
                    "模型 {} 的类型 {} 不在 Provider {} 声明的支持列表中",
                    definition.model_id,
                    definition.model_type,
                    provider.code
                );
            }
            definitions.push(definition);
        }

        Ok(definitions)
    }
}
