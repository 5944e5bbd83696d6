//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod memory;
pub mod persistence;
pub mod scheduler;

pub use adapters::FileBlobStorage;
pub use events::EventPublisher;
pub use memory::InMemoryPlaybackQueue;
pub use persistence::{DiskContentCache, JsonQueueStateStore};
