//! ModelCast — 插件化的 AI 模型 Provider 运行时
//!
//! 以插件包为单位接入模型 Provider：解析与校验插件描述符，
//! 驱动安装/启用/禁用/卸载状态机，维护运行时模型注册表，
//! 并通过实例缓存与委托路由对外提供模型调用。
//!
//! 分层：
//! - `descriptor`: 插件包格式、清单解析与校验
//! - `provider`: Provider 与模型客户端的能力契约
//! - `loader`: 入口名到 Provider 实例的解析与契约验证
//! - `registry`: 模型 / 工厂 / Options Handler 三张注册表
//! - `lifecycle`: 状态机、事件总线与生命周期管理器
//! - `router`: 模型实例缓存与委托调用客户端
//! - `service`: 管理端门面

pub mod descriptor;
pub mod lifecycle;
pub mod loader;
pub mod logger;
pub mod provider;
pub mod registry;
pub mod router;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use descriptor::{PluginDescriptor, ProviderDescriptor, ValidationResult};
pub use lifecycle::{
    InstallError, LifecycleConfig, LifecycleEvent, LifecycleEventBus, PluginLifecycleManager,
    PluginStatus,
};
pub use loader::{ProviderBuilderRegistry, ProviderLoader};
pub use provider::{ModelProvider, ProviderError};
pub use registry::{ModelRegistry, NamespaceFactoryRegistry, OptionsHandlerRegistry, ResolveError};
pub use router::{ModelClient, ModelInstanceCache, RouterConfig};
pub use service::PluginService;
