//! Application Layer - 应用层
//!
//! - Ports: 端口定义（PlaybackQueue, ContentCache, BlobStorage, QueueStateStore）

pub mod ports;
