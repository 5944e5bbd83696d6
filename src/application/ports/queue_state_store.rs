//! Queue State Store Port - 队列快照持久化

use async_trait::async_trait;
use thiserror::Error;

use super::playback_queue::QueueSnapshot;

/// 队列快照存储错误
#[derive(Debug, Error)]
pub enum QueueStoreError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Queue State Store Port
#[async_trait]
pub trait QueueStateStorePort: Send + Sync {
    /// 保存快照
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), QueueStoreError>;

    /// 读取快照，文件不存在或内容损坏时返回 `None`
    async fn load(&self) -> Option<QueueSnapshot>;
}
