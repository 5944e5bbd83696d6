//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::playback::DEFAULT_CONTENT_MAX_CHARS;
use crate::infrastructure::memory::PlaybackQueueConfig;
use crate::infrastructure::persistence::DiskCacheConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 播放队列配置
    #[serde(default)]
    pub queue: QueueConfig,

    /// 内容缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 播放队列配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// 最大条目数
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// 快照中 content 的最大字符数
    #[serde(default = "default_content_max_chars")]
    pub content_max_chars: usize,

    /// 队列快照文件路径
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

fn default_max_items() -> usize {
    100
}

fn default_content_max_chars() -> usize {
    DEFAULT_CONTENT_MAX_CHARS
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/queue.json")
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            content_max_chars: default_content_max_chars(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl QueueConfig {
    pub fn queue_config(&self) -> PlaybackQueueConfig {
        PlaybackQueueConfig {
            max_items: self.max_items,
            content_max_chars: self.content_max_chars,
        }
    }
}

/// 内容缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 缓存目录
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// 最大缓存大小（字节）
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// 最大条目数
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// 条目存活时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// 过期清理间隔（秒）
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// 单次 IO 超时（毫秒）
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_max_size_bytes() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 3600 // 7 天
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 小时
}

fn default_io_timeout_ms() -> u64 {
    5000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_size_bytes: default_max_size_bytes(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn disk_cache_config(&self) -> DiskCacheConfig {
        DiskCacheConfig {
            cache_dir: self.dir.clone(),
            max_size_bytes: self.max_size_bytes,
            max_entries: self.max_entries,
            ttl: Duration::from_secs(self.ttl_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            io_timeout: self.io_timeout(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
