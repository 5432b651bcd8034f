//! 插件生命周期
//!
//! 状态机、事件总线、安装记录存储、下载器与编排安装/启用/禁用/卸载
//! 全流程的管理器。

pub mod downloader;
pub mod events;
pub mod manager;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;

pub use downloader::PluginDownloader;
pub use events::{LifecycleEvent, LifecycleEventBus, LifecycleEventKind, LifecycleSubscriber};
pub use manager::{
    InstallError, InstallProgress, InstallStage, LifecycleConfig, NoopProgressCallback,
    PluginLifecycleManager, ProgressCallback,
};
pub use status::{transition, PluginAction, PluginStatus, StateError};
pub use store::{
    InstallationStore, MemoryInstallationStore, PluginInstallationRecord, StoreError,
};
