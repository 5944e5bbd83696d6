//! Events Layer - 事件发布

mod publisher;

pub use publisher::{CacheEvictionReason, EventPublisher, PlaybackEvent, RemovalReason};
