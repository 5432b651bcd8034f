//! 注册表模块
//!
//! 进程级共享的三张注册表，均通过句柄显式传递：
//! - 模型注册表（运行时记录 + 变更事件扇出）
//! - 命名空间工厂注册表（namespace -> 客户端工厂）
//! - Options Handler 注册表（键值配置 -> 强类型调用选项）

mod factory;
mod model_registry;
mod options;

pub use factory::{
    split_model_id, ModelFactory, NamespaceFactoryRegistry, ProviderModelFactory, ResolveError,
};
pub use model_registry::{ModelChangeEvent, ModelChangeListener, ModelMetadata, ModelRegistry};
pub use options::{
    handler_key, HandlerBuilder, OptionsError, OptionsHandler, OptionsHandlerRegistry, OptionsMap,
};
