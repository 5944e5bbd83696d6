//! Event Publisher Implementation
//!
//! 队列/缓存变更事件广播，供 UI 层订阅渲染

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::playback::{ItemId, ItemStatus};

/// 广播通道容量
const CHANNEL_CAPACITY: usize = 256;

/// 条目移除原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// 调用方显式移除
    Removed,
    /// 容量淘汰
    Evicted,
    /// clear / clear_completed
    Cleared,
}

/// 缓存条目淘汰原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvictionReason {
    Lru,
    Expired,
    MissingBlob,
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PlaybackEvent {
    /// 条目入队
    ItemAdded { id: ItemId, index: usize },
    /// 条目移除
    ItemRemoved { id: ItemId, reason: RemovalReason },
    /// 状态变更
    ItemStatusChanged {
        id: ItemId,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 进度变更
    ItemProgressChanged { id: ItemId, progress: f64 },
    /// 音频引用就绪
    ItemReferenceChanged { id: ItemId },
    /// 当前条目变更
    CurrentChanged { id: Option<ItemId> },
    /// 条目移动
    ItemReordered { id: ItemId, from: usize, to: usize },
    /// 队列清空
    QueueCleared { removed: usize },
    /// 从快照恢复
    QueueRestored { count: usize },
    /// 缓存条目被淘汰/过期/失效
    CacheEntryEvicted { key: String, reason: CacheEvictionReason },
    /// 缓存清空
    CacheCleared,
}

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<PlaybackEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.channel.subscribe()
    }

    pub fn publish_status_changed(&self, id: ItemId, status: ItemStatus, error: Option<String>) {
        self.publish(PlaybackEvent::ItemStatusChanged {
            id,
            status: status.as_str().to_string(),
            error,
        });
    }

    pub fn publish_cache_evicted(&self, key: &str, reason: CacheEvictionReason) {
        self.publish(PlaybackEvent::CacheEntryEvicted {
            key: key.to_string(),
            reason,
        });
    }

    /// 发布事件（无订阅者不视为错误）
    pub fn publish(&self, event: PlaybackEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
