//! 模型路由
//!
//! 实例缓存 + 委托客户端：把（可能缺省的）模型 ID 解析为
//! 注册表里的完整 ID，并复用缓存的模型实例执行调用。

mod cache;
mod client;

pub use cache::ModelInstanceCache;
pub use client::{ModelClient, RouterConfig};
