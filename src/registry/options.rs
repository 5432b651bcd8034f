//! Options Handler 注册表
//!
//! 把通用键值配置转换为 Provider 特定的强类型调用选项。
//! 键格式为 `"<provider>:<modelType>"`；另支持按全限定处理器名
//! 按需构建并缓存（插件配置可以用处理器名覆盖默认键查找）。

use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::ModelType;
use crate::provider::{BoxedOptions, ProviderResult};

/// Options Handler 错误
#[derive(Error, Debug)]
pub enum OptionsError {
    /// 配置未通过校验
    #[error("配置未通过校验: {0}")]
    ValidationFailed(String),

    /// 处理器不存在
    #[error("Options Handler 不存在: {0}")]
    HandlerNotFound(String),
}

/// 通用键值配置
pub type OptionsMap = IndexMap<String, serde_json::Value>;

/// 配置转换处理器
///
/// `build_options` 只应在 `validate_config` 返回 true 后调用；
/// 跳过校验的调用方自行承担字段缺失被静默取默认值的后果。
pub trait OptionsHandler: Send + Sync {
    /// 处理器全限定名（缓存键）
    fn handler_name(&self) -> &str;

    /// 校验配置
    fn validate_config(&self, config: &OptionsMap) -> bool;

    /// 构建强类型选项
    fn build_options(&self, config: &OptionsMap) -> ProviderResult<BoxedOptions>;
}

impl std::fmt::Debug for dyn OptionsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsHandler")
            .field("handler_name", &self.handler_name())
            .finish()
    }
}

/// 处理器构建函数（按需加载用）
pub type HandlerBuilder = Arc<dyn Fn() -> Arc<dyn OptionsHandler> + Send + Sync>;

/// 组装标准键 `"<provider>:<modelType>"`
pub fn handler_key(provider: &str, model_type: ModelType) -> String {
    format!("{}:{}", provider, model_type)
}

/// Options Handler 注册表
#[derive(Default)]
pub struct OptionsHandlerRegistry {
    /// 标准键 -> 处理器
    handlers: DashMap<String, Arc<dyn OptionsHandler>>,
    /// 处理器名 -> 实例缓存
    by_name: DashMap<String, Arc<dyn OptionsHandler>>,
    /// 处理器名 -> 构建函数
    builders: DashMap<String, HandlerBuilder>,
}

impl std::fmt::Debug for OptionsHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsHandlerRegistry")
            .field("handlers", &self.handlers.len())
            .field("cached", &self.by_name.len())
            .finish()
    }
}

impl OptionsHandlerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器
    ///
    /// 同键重复注册为后写覆盖，记录日志。
    pub fn register_handler(&self, key: impl Into<String>, handler: Arc<dyn OptionsHandler>) {
        let key = key.into();
        self.by_name
            .insert(handler.handler_name().to_string(), Arc::clone(&handler));
        if self.handlers.insert(key.clone(), handler).is_some() {
            tracing::info!("Options Handler 被替换: {}", key);
        }
    }

    /// 按标准键查找处理器
    pub fn get_handler(&self, key: &str) -> Option<Arc<dyn OptionsHandler>> {
        self.handlers.get(key).map(|h| Arc::clone(&h))
    }

    /// 注册按名构建函数（供处理器名覆盖场景按需实例化）
    pub fn register_handler_builder(&self, name: impl Into<String>, builder: HandlerBuilder) {
        self.builders.insert(name.into(), builder);
    }

    /// 按处理器全限定名解析
    ///
    /// 优先取实例缓存，未命中时用构建函数实例化并缓存。
    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<dyn OptionsHandler>> {
        if let Some(handler) = self.by_name.get(name) {
            return Some(Arc::clone(&handler));
        }
        let builder = self.builders.get(name).map(|b| Arc::clone(&b))?;
        let handler = builder();
        tracing::debug!("按需实例化 Options Handler: {}", name);
        self.by_name.insert(name.to_string(), Arc::clone(&handler));
        Some(handler)
    }

    /// 解析某个模型的处理器并校验配置
    ///
    /// `override_name` 来自插件配置，存在时必须可解析——
    /// 显式指定了处理器却找不到按错误处理，不做静默回退。
    /// 没有任何处理器时返回 `Ok(None)`（该模型不做选项转换）；
    /// 配置未通过处理器校验时返回 `ValidationFailed`。
    pub fn validated_handler(
        &self,
        provider: &str,
        model_type: ModelType,
        override_name: Option<&str>,
        config: &OptionsMap,
    ) -> Result<Option<Arc<dyn OptionsHandler>>, OptionsError> {
        let handler = match override_name {
            Some(name) => Some(
                self.resolve_by_name(name)
                    .ok_or_else(|| OptionsError::HandlerNotFound(name.to_string()))?,
            ),
            None => self.get_handler(&handler_key(provider, model_type)),
        };
        let Some(handler) = handler else {
            return Ok(None);
        };

        if !handler.validate_config(config) {
            return Err(OptionsError::ValidationFailed(format!(
                "配置未满足 {} 的约束",
                handler.handler_name()
            )));
        }
        Ok(Some(handler))
    }

    /// 移除某个 Provider 的全部处理器
    pub fn remove_provider(&self, provider: &str) {
        let prefix = format!("{}:", provider);
        let keys: Vec<String> = self
            .handlers
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.handlers.remove(&key);
        }
    }
}
