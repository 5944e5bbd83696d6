//! Persistence Layer - 数据持久化
//!
//! 磁盘内容缓存与队列快照文件

pub mod disk;
pub mod json;

pub use disk::{DiskCacheConfig, DiskContentCache};
pub use json::JsonQueueStateStore;
