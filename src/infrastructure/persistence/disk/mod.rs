//! Disk Persistence - 磁盘内容缓存

mod checkpoint;
mod content_cache;

pub use checkpoint::{CacheCheckpoint, CheckpointFile, CHECKPOINT_FILE_NAME};
pub use content_cache::{DiskCacheConfig, DiskContentCache};
