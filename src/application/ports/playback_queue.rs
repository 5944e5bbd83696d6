//! Playback Queue Port - 播放队列
//!
//! 定义播放队列的抽象接口，具体实现在 infrastructure/memory 层

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::playback::{ItemId, ItemStatus, NewPlayableItem, PlayableItem};

/// 队列快照（持久化格式）
///
/// 条目为脱敏、截断后的副本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub items: Vec<PlayableItem>,
    #[serde(default)]
    pub current_item_id: Option<ItemId>,
    pub last_updated: DateTime<Utc>,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current_item_id: None,
            last_updated: Utc::now(),
        }
    }
}

/// 队列统计（按粗粒度状态分桶）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    /// Pending + Downloading
    pub pending: usize,
    /// Ready + Playing + Paused
    pub ready: usize,
    pub completed: usize,
    pub error: usize,
}

/// Playback Queue Port
///
/// 按优先级排序的播放条目集合。未知 id 上的操作一律返回 `false`/`None`，不返回错误。
pub trait PlaybackQueuePort: Send + Sync {
    /// 入队，返回新分配的 id
    ///
    /// 插入到第一个优先级严格更低的条目之前；同优先级保持先进先出。
    /// 队列已满时先按容量淘汰规则移除一个条目。
    fn add(&self, item: NewPlayableItem) -> ItemId;

    /// 移除条目
    fn remove(&self, id: &ItemId) -> bool;

    fn get(&self, id: &ItemId) -> Option<PlayableItem>;

    fn get_all(&self) -> Vec<PlayableItem>;

    /// 按当前顺序返回第一个非终态条目
    fn get_next(&self) -> Option<PlayableItem>;

    /// 设置当前条目，`None` 清空；id 不存在时返回 `false`
    fn set_current(&self, id: Option<ItemId>) -> bool;

    fn get_current(&self) -> Option<PlayableItem>;

    /// 更新状态，error 会先脱敏
    fn update_status(&self, id: &ItemId, status: ItemStatus, error: Option<&str>) -> bool;

    fn update_progress(&self, id: &ItemId, progress: f64) -> bool;

    fn update_reference(&self, id: &ItemId, reference: &str) -> bool;

    /// 移除所有 Completed / Error 条目，返回移除数量
    fn clear_completed(&self) -> usize;

    fn clear(&self);

    /// 移动条目到指定位置（不改变优先级）
    fn reorder(&self, id: &ItemId, new_index: usize) -> bool;

    fn get_state(&self) -> QueueSnapshot;

    /// 用快照替换整个队列，随后重新执行容量清理
    fn restore_state(&self, snapshot: QueueSnapshot);

    fn get_stats(&self) -> QueueStats;
}
