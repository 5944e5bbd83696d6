//! Memory Layer - In-Memory State Management
//!
//! 实现播放队列的内存状态

mod playback_queue;

pub use playback_queue::{InMemoryPlaybackQueue, PlaybackQueueConfig};
