//! Playcache - 播放队列与内容缓存
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Playback: 播放条目、优先级、状态
//! - Sanitizer: 错误信息与路径脱敏
//!
//! 应用层 (application/):
//! - Ports: 端口定义（PlaybackQueue, ContentCache, BlobStorage, QueueStateStore）
//!
//! 基础设施层 (infrastructure/):
//! - Memory: 播放队列内存实现
//! - Persistence: 磁盘 LRU 缓存 + 队列快照
//! - Adapters: 文件系统 blob 存储
//! - Scheduler: 定时清理任务
//! - Events: 队列与缓存事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
