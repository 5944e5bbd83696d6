//! Application Ports - 出站端口定义
//!
//! 定义编排层与基础设施层之间的抽象接口

mod blob_storage;
mod content_cache;
mod playback_queue;
mod queue_state_store;

pub use blob_storage::{BlobStoragePort, StorageError, StoredFile};
pub use content_cache::{
    fingerprint, CacheEntry, CacheError, CacheHandle, CacheStats, ContentCachePort, EntryId,
    WarmItem, WarmReport, DEFAULT_LANGUAGE, DEFAULT_VOICE,
};
pub use playback_queue::{PlaybackQueuePort, QueueSnapshot, QueueStats};
pub use queue_state_store::{QueueStateStorePort, QueueStoreError};
