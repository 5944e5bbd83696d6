//! In-Memory Playback Queue Implementation

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::application::ports::{PlaybackQueuePort, QueueSnapshot, QueueStats};
use crate::domain::playback::{
    ItemId, ItemStatus, NewPlayableItem, PlayableItem, DEFAULT_CONTENT_MAX_CHARS,
};
use crate::domain::sanitizer::sanitize;
use crate::infrastructure::events::{EventPublisher, PlaybackEvent, RemovalReason};

/// 队列配置
#[derive(Debug, Clone)]
pub struct PlaybackQueueConfig {
    /// 最大条目数
    pub max_items: usize,
    /// 快照中 content 的最大字符数
    pub content_max_chars: usize,
}

impl Default for PlaybackQueueConfig {
    fn default() -> Self {
        Self {
            max_items: 100,
            content_max_chars: DEFAULT_CONTENT_MAX_CHARS,
        }
    }
}

/// 队列内部状态
///
/// `items` 同时承担顺序与 id 索引，两者不可能不一致
struct QueueState {
    items: IndexMap<ItemId, PlayableItem>,
    current: Option<ItemId>,
    last_added_at: Option<DateTime<Utc>>,
    last_updated: DateTime<Utc>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            items: IndexMap::new(),
            current: None,
            last_added_at: None,
            last_updated: Utc::now(),
        }
    }

    /// 分配单调不减的入队时间
    fn next_added_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let added_at = match self.last_added_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_added_at = Some(added_at);
        added_at
    }

    /// 按插入规则计算位置：第一个优先级严格更低的条目之前，否则末尾
    fn insert_position(&self, item: &PlayableItem) -> usize {
        self.items
            .values()
            .position(|existing| existing.priority < item.priority)
            .unwrap_or(self.items.len())
    }

    /// 移除条目，同时清除指向它的 current
    fn take(&mut self, id: &ItemId) -> Option<PlayableItem> {
        let removed = self.items.shift_remove(id)?;
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        Some(removed)
    }

    /// 容量淘汰候选
    ///
    /// 优先最早入队的终态条目；没有终态条目时淘汰最早入队的任意条目（包括进行中的条目）
    fn eviction_candidate(&self) -> Option<ItemId> {
        self.items
            .values()
            .filter(|item| item.status.is_terminal())
            .min_by_key(|item| item.added_at)
            .or_else(|| self.items.values().min_by_key(|item| item.added_at))
            .map(|item| item.id)
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// 内存播放队列
pub struct InMemoryPlaybackQueue {
    config: PlaybackQueueConfig,
    state: RwLock<QueueState>,
    events: Option<Arc<EventPublisher>>,
}

impl InMemoryPlaybackQueue {
    pub fn new(config: PlaybackQueueConfig) -> Self {
        Self {
            config,
            state: RwLock::new(QueueState::new()),
            events: None,
        }
    }

    /// 设置事件发布器
    pub fn with_event_publisher(mut self, events: Arc<EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn max_items(&self) -> usize {
        self.config.max_items
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    // 状态只在持锁的同步代码中修改，锁中毒时内部状态仍然一致，直接继续使用
    fn read(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// 淘汰直到条目数不超过 `limit`，返回被淘汰的 id
    fn evict_down_to(&self, state: &mut QueueState, limit: usize) -> Vec<ItemId> {
        let mut evicted = Vec::new();
        while state.items.len() > limit {
            let Some(id) = state.eviction_candidate() else {
                break;
            };
            if let Some(item) = state.take(&id) {
                tracing::warn!(
                    item_id = %id,
                    status = item.status.as_str(),
                    max_items = self.config.max_items,
                    "Queue at capacity, evicted item"
                );
                evicted.push(id);
            }
        }
        evicted
    }

    fn publish_evicted(&self, evicted: Vec<ItemId>) {
        for id in evicted {
            self.publish(PlaybackEvent::ItemRemoved {
                id,
                reason: RemovalReason::Evicted,
            });
        }
    }
}

impl Default for InMemoryPlaybackQueue {
    fn default() -> Self {
        Self::new(PlaybackQueueConfig::default())
    }
}

impl PlaybackQueuePort for InMemoryPlaybackQueue {
    fn add(&self, item: NewPlayableItem) -> ItemId {
        let priority = item.priority;
        let source = item.metadata.source;
        let (id, index, evicted) = {
            let mut state = self.write();

            let limit = self.config.max_items.saturating_sub(1);
            let evicted = self.evict_down_to(&mut state, limit);

            let id = ItemId::new();
            let added_at = state.next_added_at();
            let item = PlayableItem::from_new(id, added_at, item);
            let index = state.insert_position(&item);
            state.items.shift_insert(index, id, item);
            state.touch();
            (id, index, evicted)
        };

        tracing::debug!(
            item_id = %id,
            index = index,
            priority = priority.as_str(),
            source = source.as_str(),
            "Item added to queue"
        );
        self.publish_evicted(evicted);
        self.publish(PlaybackEvent::ItemAdded { id, index });
        id
    }

    fn remove(&self, id: &ItemId) -> bool {
        let removed = {
            let mut state = self.write();
            let removed = state.take(id).is_some();
            if removed {
                state.touch();
            }
            removed
        };

        if removed {
            tracing::debug!(item_id = %id, "Item removed from queue");
            self.publish(PlaybackEvent::ItemRemoved {
                id: *id,
                reason: RemovalReason::Removed,
            });
        }
        removed
    }

    fn get(&self, id: &ItemId) -> Option<PlayableItem> {
        self.read().items.get(id).cloned()
    }

    fn get_all(&self) -> Vec<PlayableItem> {
        self.read().items.values().cloned().collect()
    }

    fn get_next(&self) -> Option<PlayableItem> {
        self.read()
            .items
            .values()
            .find(|item| !item.status.is_terminal())
            .cloned()
    }

    fn set_current(&self, id: Option<ItemId>) -> bool {
        {
            let mut state = self.write();
            if let Some(id) = &id {
                if !state.items.contains_key(id) {
                    return false;
                }
            }
            state.current = id;
            state.touch();
        }
        self.publish(PlaybackEvent::CurrentChanged { id });
        true
    }

    fn get_current(&self) -> Option<PlayableItem> {
        let state = self.read();
        state
            .current
            .as_ref()
            .and_then(|id| state.items.get(id))
            .cloned()
    }

    fn update_status(&self, id: &ItemId, status: ItemStatus, error: Option<&str>) -> bool {
        let error = error.map(sanitize);
        {
            let mut state = self.write();
            let Some(item) = state.items.get_mut(id) else {
                return false;
            };
            let old_status = item.status;
            item.status = status;
            if let Some(error) = &error {
                item.error = Some(error.clone());
            }
            state.touch();

            tracing::debug!(
                item_id = %id,
                old_status = old_status.as_str(),
                new_status = status.as_str(),
                "Item status changed"
            );
        }

        if let Some(events) = &self.events {
            events.publish_status_changed(*id, status, error);
        }
        true
    }

    fn update_progress(&self, id: &ItemId, progress: f64) -> bool {
        let progress = {
            let mut state = self.write();
            let Some(item) = state.items.get_mut(id) else {
                return false;
            };
            item.set_progress(progress);
            let progress = item.progress;
            state.touch();
            progress
        };

        self.publish(PlaybackEvent::ItemProgressChanged { id: *id, progress });
        true
    }

    fn update_reference(&self, id: &ItemId, reference: &str) -> bool {
        {
            let mut state = self.write();
            let Some(item) = state.items.get_mut(id) else {
                return false;
            };
            item.reference = Some(reference.to_string());
            state.touch();
        }

        self.publish(PlaybackEvent::ItemReferenceChanged { id: *id });
        true
    }

    fn clear_completed(&self) -> usize {
        let removed: Vec<ItemId> = {
            let mut state = self.write();
            let ids: Vec<ItemId> = state
                .items
                .values()
                .filter(|item| item.status.is_terminal())
                .map(|item| item.id)
                .collect();
            for id in &ids {
                state.take(id);
            }
            if !ids.is_empty() {
                state.touch();
            }
            ids
        };

        tracing::debug!(count = removed.len(), "Completed items cleared");
        let count = removed.len();
        for id in removed {
            self.publish(PlaybackEvent::ItemRemoved {
                id,
                reason: RemovalReason::Cleared,
            });
        }
        count
    }

    fn clear(&self) {
        let removed = {
            let mut state = self.write();
            let removed = state.items.len();
            state.items.clear();
            state.current = None;
            state.touch();
            removed
        };

        tracing::info!(removed = removed, "Queue cleared");
        self.publish(PlaybackEvent::QueueCleared { removed });
    }

    fn reorder(&self, id: &ItemId, new_index: usize) -> bool {
        let from = {
            let mut state = self.write();
            if new_index >= state.items.len() {
                return false;
            }
            let Some(from) = state.items.get_index_of(id) else {
                return false;
            };
            state.items.move_index(from, new_index);
            state.touch();
            from
        };

        tracing::debug!(item_id = %id, from = from, to = new_index, "Item reordered");
        self.publish(PlaybackEvent::ItemReordered {
            id: *id,
            from,
            to: new_index,
        });
        true
    }

    fn get_state(&self) -> QueueSnapshot {
        let state = self.read();
        QueueSnapshot {
            items: state
                .items
                .values()
                .map(|item| item.to_persisted(self.config.content_max_chars))
                .collect(),
            current_item_id: state.current,
            last_updated: state.last_updated,
        }
    }

    fn restore_state(&self, snapshot: QueueSnapshot) {
        let (count, evicted) = {
            let mut state = self.write();

            let mut items = IndexMap::with_capacity(snapshot.items.len());
            for mut item in snapshot.items {
                let progress = item.progress;
                item.set_progress(progress);
                items.insert(item.id, item);
            }

            state.last_added_at = items.values().map(|item| item.added_at).max();
            state.current = snapshot
                .current_item_id
                .filter(|id| items.contains_key(id));
            state.items = items;
            state.last_updated = snapshot.last_updated;

            let evicted = self.evict_down_to(&mut state, self.config.max_items);
            (state.items.len(), evicted)
        };

        tracing::info!(
            count = count,
            evicted = evicted.len(),
            "Queue restored from snapshot"
        );
        self.publish_evicted(evicted);
        self.publish(PlaybackEvent::QueueRestored { count });
    }

    fn get_stats(&self) -> QueueStats {
        let state = self.read();
        let mut stats = QueueStats {
            total: state.items.len(),
            ..QueueStats::default()
        };
        for item in state.items.values() {
            match item.status {
                s if s.is_pending_like() => stats.pending += 1,
                s if s.is_ready_like() => stats.ready += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::Error => stats.error += 1,
                _ => {}
            }
        }
        stats
    }
}
