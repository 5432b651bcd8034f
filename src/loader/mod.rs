//! Provider 加载器
//!
//! "加载并验证"插件入口声明的 Provider 代码。Rust 下不从压缩包加载
//! 编译产物，入口名解析为编译期链接进来的构建器（构建器注册表），
//! 由构建器依据解析出的描述符实例化 Provider，再做能力契约验证。
//! 不同插件的入口互不相干，同名内部类型不会冲突。
//!
//! 失败按阶段打标：
//! - DependencyCheck: 入口不存在（构建器未注册）
//! - Initialization: 构建失败或能力契约验证失败

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::{PluginDescriptor, ProviderDescriptor};
use crate::provider::{ModelProvider, ProviderError};

/// 加载失败阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// 依赖检查（入口解析）
    DependencyCheck,
    /// 实例化与契约验证
    Initialization,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::DependencyCheck => write!(f, "dependency_check"),
            LoadStage::Initialization => write!(f, "initialization"),
        }
    }
}

/// 加载错误
#[derive(Error, Debug)]
pub enum LoadError {
    /// 入口未注册
    #[error("[dependency_check] 入口 {0} 没有已注册的构建器")]
    EntryNotFound(String),

    /// 构建失败
    #[error("[initialization] 入口 {entry} 实例化失败: {source}")]
    BuildFailed {
        /// 入口名
        entry: String,
        /// 底层错误
        #[source]
        source: ProviderError,
    },

    /// 契约验证失败
    #[error("[initialization] 入口 {entry} 未满足 Provider 契约: {reason}")]
    ContractViolation {
        /// 入口名
        entry: String,
        /// 违反原因
        reason: String,
    },
}

impl LoadError {
    /// 失败所处阶段
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::EntryNotFound(_) => LoadStage::DependencyCheck,
            LoadError::BuildFailed { .. } | LoadError::ContractViolation { .. } => {
                LoadStage::Initialization
            }
        }
    }
}

/// Provider 构建函数
///
/// 输入为插件与 Provider 描述符，输出 Provider 实例。
pub type ProviderBuilder = Arc<
    dyn Fn(&PluginDescriptor, &ProviderDescriptor) -> Result<Arc<dyn ModelProvider>, ProviderError>
        + Send
        + Sync,
>;

/// 构建器注册表
///
/// 入口名（清单里的 `entry` 字段）-> 构建函数。
#[derive(Default)]
pub struct ProviderBuilderRegistry {
    builders: DashMap<String, ProviderBuilder>,
}

impl std::fmt::Debug for ProviderBuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBuilderRegistry")
            .field("builders", &self.builders.len())
            .finish()
    }
}

impl ProviderBuilderRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册构建器，后写覆盖
    pub fn register(&self, entry: impl Into<String>, builder: ProviderBuilder) {
        let entry = entry.into();
        if self.builders.insert(entry.clone(), builder).is_some() {
            tracing::info!("Provider 构建器被替换: {}", entry);
        }
    }

    /// 查找构建器
    pub fn get(&self, entry: &str) -> Option<ProviderBuilder> {
        self.builders.get(entry).map(|b| Arc::clone(&b))
    }

    /// 是否包含入口
    pub fn contains(&self, entry: &str) -> bool {
        self.builders.contains_key(entry)
    }
}

/// Provider 加载器
pub struct ProviderLoader {
    builders: Arc<ProviderBuilderRegistry>,
}

impl ProviderLoader {
    /// 基于构建器注册表创建加载器
    pub fn new(builders: Arc<ProviderBuilderRegistry>) -> Self {
        Self { builders }
    }

    /// 加载并验证 Provider
    ///
    /// 按插件清单的 `entry` 解析构建器，实例化后验证：
    /// - 命名空间与 Provider 描述符的 code 一致
    /// - 声明支持的模型类型不超出实例的能力集
    pub fn load(
        &self,
        plugin: &PluginDescriptor,
        provider_descriptor: &ProviderDescriptor,
    ) -> Result<Arc<dyn ModelProvider>, LoadError> {
        let builder = self
            .builders
            .get(&plugin.entry)
            .ok_or_else(|| LoadError::EntryNotFound(plugin.entry.clone()))?;

        let provider = builder(plugin, provider_descriptor).map_err(|e| LoadError::BuildFailed {
            entry: plugin.entry.clone(),
            source: e,
        })?;

        self.verify_contract(&plugin.entry, provider_descriptor, provider.as_ref())?;

        tracing::info!(
            "Provider 加载完成: 入口={} 命名空间={}",
            plugin.entry,
            provider.namespace()
        );
        Ok(provider)
    }

    /// 能力契约验证
    fn verify_contract(
        &self,
        entry: &str,
        descriptor: &ProviderDescriptor,
        provider: &dyn ModelProvider,
    ) -> Result<(), LoadError> {
        if provider.namespace() != descriptor.code {
            return Err(LoadError::ContractViolation {
                entry: entry.to_string(),
                reason: format!(
                    "命名空间不一致: 实例为 {}，描述符为 {}",
                    provider.namespace(),
                    descriptor.code
                ),
            });
        }

        let capabilities = provider.supported_model_types();
        for declared in &descriptor.supported_model_types {
            if !capabilities.contains(declared) {
                return Err(LoadError::ContractViolation {
                    entry: entry.to_string(),
                    reason: format!("描述符声明了 {} 能力，但实例未提供", declared),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{demo_chat_model, demo_manifest, demo_provider, echo_builder};

    fn demo_descriptors() -> (PluginDescriptor, ProviderDescriptor) {
        let plugin: PluginDescriptor = serde_json::from_str(demo_manifest()).unwrap();
        let provider: ProviderDescriptor = serde_json::from_str(demo_provider()).unwrap();
        let _ = demo_chat_model();
        (plugin, provider)
    }

    #[test]
    fn load_resolves_registered_entry() {
        let builders = Arc::new(ProviderBuilderRegistry::new());
        builders.register("com.example.Provider", echo_builder());
        let loader = ProviderLoader::new(builders);

        let (plugin, provider_descriptor) = demo_descriptors();
        let provider = loader.load(&plugin, &provider_descriptor).unwrap();
        assert_eq!(provider.namespace(), "demo");
    }

    #[test]
    fn unknown_entry_fails_at_dependency_check() {
        let loader = ProviderLoader::new(Arc::new(ProviderBuilderRegistry::new()));
        let (plugin, provider_descriptor) = demo_descriptors();

        let err = loader.load(&plugin, &provider_descriptor).unwrap_err();
        assert_eq!(err.stage(), LoadStage::DependencyCheck);
    }

    #[test]
    fn capability_mismatch_fails_at_initialization() {
        let builders = Arc::new(ProviderBuilderRegistry::new());
        builders.register("com.example.Provider", echo_builder());
        let loader = ProviderLoader::new(builders);

        let (plugin, mut provider_descriptor) = demo_descriptors();
        // Echo Provider 不支持图像生成
        provider_descriptor
            .supported_model_types
            .push(crate::descriptor::ModelType::Image);

        let err = loader.load(&plugin, &provider_descriptor).unwrap_err();
        assert_eq!(err.stage(), LoadStage::Initialization);
        assert!(matches!(err, LoadError::ContractViolation { .. }));
    }

    #[test]
    fn same_entry_name_in_two_registries_does_not_collide() {
        // 两个插件各自的注册表可声明同名入口，互不干扰
        let builders_a = Arc::new(ProviderBuilderRegistry::new());
        let builders_b = Arc::new(ProviderBuilderRegistry::new());
        builders_a.register("com.example.Provider", echo_builder());

        assert!(builders_a.contains("com.example.Provider"));
        assert!(!builders_b.contains("com.example.Provider"));
    }
}
