//! Disk-based LRU Content Cache Implementation
//!
//! 一个条目一个 blob 文件，元数据定期写入 JSON 检查点。
//! 所有修改操作（包括其中的 blob IO）都在同一把锁内完成，
//! 外部永远看不到大小统计、访问顺序处于中间状态。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::checkpoint::{CacheCheckpoint, CheckpointFile};
use crate::application::ports::{
    BlobStoragePort, CacheEntry, CacheError, CacheHandle, CacheStats, ContentCachePort, EntryId,
    StorageError, StoredFile, WarmItem, WarmReport,
};
use crate::domain::sanitizer::sanitize;
use crate::infrastructure::adapters::FileBlobStorage;
use crate::infrastructure::events::{CacheEvictionReason, EventPublisher, PlaybackEvent};
use crate::infrastructure::scheduler::PeriodicTask;

/// 磁盘缓存配置
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// 缓存目录（blob 与检查点）
    pub cache_dir: PathBuf,
    /// 最大缓存大小（字节）
    pub max_size_bytes: u64,
    /// 最大条目数
    pub max_entries: usize,
    /// 条目存活时间（从创建开始计算）
    pub ttl: Duration,
    /// 过期清理间隔
    pub cleanup_interval: Duration,
    /// 单次 IO 超时
    pub io_timeout: Duration,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/cache"),
            max_size_bytes: 100 * 1024 * 1024, // 100MB
            max_entries: 1000,
            ttl: Duration::from_secs(7 * 24 * 3600), // 7 天
            cleanup_interval: Duration::from_secs(3600),
            io_timeout: Duration::from_secs(5),
        }
    }
}

/// 缓存内部状态
///
/// `entries` 同时是 key 索引和访问顺序（LRU 在尾部）
struct CacheState {
    entries: LruCache<String, CacheEntry>,
    total_size: u64,
    hit_count: u64,
    miss_count: u64,
    eviction_count: u64,
    /// 自上次检查点后元数据是否有变化
    dirty: bool,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_size: 0,
            hit_count: 0,
            miss_count: 0,
            eviction_count: 0,
            dirty: false,
        }
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.total_size += entry.size;
        self.entries.put(entry.key.clone(), entry);
    }

    fn detach(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.total_size = self.total_size.saturating_sub(entry.size);
        self.dirty = true;
        Some(entry)
    }

    fn to_checkpoint(&self) -> CacheCheckpoint {
        // LruCache::iter 从 MRU 开始，检查点按 LRU → MRU 保存
        let entries: Vec<CacheEntry> = self.entries.iter().rev().map(|(_, e)| e.clone()).collect();
        let access_order = entries.iter().map(|e| e.key.clone()).collect();
        CacheCheckpoint {
            entries,
            access_order,
            total_size: self.total_size,
            eviction_count: self.eviction_count,
            saved_at: Some(Utc::now()),
        }
    }
}

/// 磁盘内容缓存
pub struct DiskContentCache {
    config: DiskCacheConfig,
    storage: Arc<dyn BlobStoragePort>,
    checkpoint: CheckpointFile,
    state: Mutex<CacheState>,
    maintenance: Mutex<Option<PeriodicTask>>,
    events: Option<Arc<EventPublisher>>,
}

impl DiskContentCache {
    /// 打开缓存（使用文件系统 blob 存储）
    pub async fn open(config: DiskCacheConfig) -> Result<Self, CacheError> {
        let storage = FileBlobStorage::new(&config.cache_dir, config.io_timeout)
            .await
            .map_err(|e| CacheError::StorageError(e.to_string()))?;
        Self::open_with_storage(config, Arc::new(storage)).await
    }

    /// 打开缓存并从检查点恢复
    ///
    /// 检查点损坏时从空缓存开始；blob 丢失的条目被丢弃；总大小按实际文件重新计算
    pub async fn open_with_storage(
        config: DiskCacheConfig,
        storage: Arc<dyn BlobStoragePort>,
    ) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(&config.cache_dir)
            .await
            .map_err(|e| CacheError::StorageError(sanitize(&e.to_string())))?;

        let checkpoint = CheckpointFile::new(&config.cache_dir, config.io_timeout);

        let cache = Self {
            config,
            storage,
            checkpoint,
            state: Mutex::new(CacheState::new()),
            maintenance: Mutex::new(None),
            events: None,
        };
        cache.recover().await;
        Ok(cache)
    }

    /// 设置事件发布器
    pub fn with_event_publisher(mut self, events: Arc<EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &DiskCacheConfig {
        &self.config
    }

    /// 启动后台过期清理任务
    ///
    /// 任务只持有弱引用，缓存被释放后自动退出
    pub async fn start_maintenance(self: &Arc<Self>) {
        let mut slot = self.maintenance.lock().await;
        if slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let task = PeriodicTask::spawn("cache-cleanup", self.config.cleanup_interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(cache) => {
                        cache.cleanup().await;
                        true
                    }
                    None => false,
                }
            }
        });

        tracing::info!(
            task = task.name(),
            interval_secs = self.config.cleanup_interval.as_secs(),
            ttl_secs = self.config.ttl.as_secs(),
            "Cache maintenance started"
        );
        *slot = Some(task);
    }

    /// 以指定时间为基准清理过期条目
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().await;

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = state.detach(key) {
                self.delete_blob(&entry).await;
                self.publish_evicted(key, CacheEvictionReason::Expired);
            }
        }

        if !expired.is_empty() {
            tracing::info!(
                removed = expired.len(),
                remaining = state.entries.len(),
                "Expired cache entries removed"
            );
        }

        if state.dirty {
            self.save_locked(&mut state).await;
        }
        expired.len()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // 时钟回拨导致的负值不算过期
        (now - entry.created)
            .to_std()
            .map(|age| age > self.config.ttl)
            .unwrap_or(false)
    }

    /// 从检查点恢复
    async fn recover(&self) {
        let mut state = self.state.lock().await;

        let checkpoint = match self.checkpoint.load().await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => CacheCheckpoint::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Cache checkpoint unreadable, starting empty");
                CacheCheckpoint::default()
            }
        };
        let recorded_size = checkpoint.total_size;
        let recorded_count = checkpoint.entries.len();
        state.eviction_count = checkpoint.eviction_count;

        let mut dropped = 0usize;
        for mut entry in replay_order(checkpoint) {
            match self.storage.size(&entry.id).await {
                Ok(size) => {
                    entry.size = size;
                    state.insert(entry);
                }
                Err(StorageError::NotFound(_)) => {
                    tracing::debug!(key = %entry.key, "Dropping cache entry without blob");
                    dropped += 1;
                }
                Err(e) => {
                    // 无法确认 blob 已丢失，保留条目与检查点中的大小
                    tracing::warn!(
                        key = %entry.key,
                        error = %e,
                        "Failed to stat cache blob, keeping entry"
                    );
                    state.insert(entry);
                }
            }
        }

        let swept = self.sweep_orphans(&state).await;
        let evicted = self.make_room_locked(&mut state, 0, 0).await;

        if dropped > 0 || swept > 0 || evicted > 0 || state.total_size != recorded_size {
            state.dirty = true;
        }
        if state.dirty {
            self.save_locked(&mut state).await;
        }

        tracing::info!(
            entries = state.entries.len(),
            total_size = state.total_size,
            recorded_entries = recorded_count,
            recorded_size = recorded_size,
            dropped = dropped,
            orphans_removed = swept,
            "Content cache recovered"
        );
    }

    /// 删除未被任何条目引用的 blob 与中断写入遗留的临时文件
    async fn sweep_orphans(&self, state: &CacheState) -> usize {
        let files = match self.storage.list_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to scan cache directory");
                return 0;
            }
        };

        let live: HashSet<EntryId> = state.entries.iter().map(|(_, e)| e.id).collect();
        let mut removed = 0;
        for file in files {
            let result = match &file {
                StoredFile::Blob(id) if !live.contains(id) => self.storage.delete(id).await,
                StoredFile::Partial(path) => self.storage.remove_partial(path).await,
                StoredFile::Blob(_) => continue,
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(error = %e, "Failed to remove orphan cache file"),
            }
        }
        removed
    }

    /// 命中处理
    ///
    /// 确认 blob 已丢失时清除条目；无法确认（IO 错误、超时）时保留条目。两种情况都计为未命中
    async fn lookup_locked(&self, state: &mut CacheState, key: &str) -> Option<CacheHandle> {
        let id = match state.entries.peek(key) {
            Some(entry) => entry.id,
            None => {
                state.miss_count += 1;
                return None;
            }
        };

        match self.storage.exists(&id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(key = %key, "Cache entry lost its blob, purging");
                state.detach(key);
                state.miss_count += 1;
                self.publish_evicted(key, CacheEvictionReason::MissingBlob);
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to check cache blob");
                state.miss_count += 1;
                return None;
            }
        }

        let entry = state.entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_accessed = Utc::now();
        let handle = CacheHandle::from_entry(entry);

        state.hit_count += 1;
        state.dirty = true;
        Some(handle)
    }

    /// LRU 淘汰，直到可以再容纳 `incoming_slots` 个、共 `incoming_bytes` 字节的新条目
    ///
    /// 两者都为 0 时只把现有条目压回预算之内
    async fn make_room_locked(
        &self,
        state: &mut CacheState,
        incoming_bytes: u64,
        incoming_slots: usize,
    ) -> usize {
        let mut evicted = 0;

        while state.total_size + incoming_bytes > self.config.max_size_bytes
            || state.entries.len() + incoming_slots > self.config.max_entries
        {
            let Some((key, entry)) = state.entries.pop_lru() else {
                break;
            };
            state.total_size = state.total_size.saturating_sub(entry.size);
            state.eviction_count += 1;
            state.dirty = true;
            evicted += 1;

            self.delete_blob(&entry).await;
            tracing::debug!(key = %key, size_bytes = entry.size, "LRU evicted cache entry");
            self.publish_evicted(&key, CacheEvictionReason::Lru);
        }
        evicted
    }

    /// 删除 blob，失败只记录日志（元数据照常删除）
    async fn delete_blob(&self, entry: &CacheEntry) {
        if let Err(e) = self.storage.delete(&entry.id).await {
            tracing::warn!(
                key = %entry.key,
                display_path = %entry.display_path,
                error = %e,
                "Failed to delete cache blob"
            );
        }
    }

    async fn save_locked(&self, state: &mut CacheState) {
        match self.checkpoint.save(&state.to_checkpoint()).await {
            Ok(()) => state.dirty = false,
            Err(e) => tracing::warn!(error = %e, "Failed to write cache checkpoint"),
        }
    }

    fn publish_evicted(&self, key: &str, reason: CacheEvictionReason) {
        if let Some(events) = &self.events {
            events.publish_cache_evicted(key, reason);
        }
    }

    #[cfg(test)]
    async fn assert_consistent(&self) {
        let state = self.state.lock().await;
        let sum: u64 = state.entries.iter().map(|(_, e)| e.size).sum();
        assert_eq!(sum, state.total_size);
        let keys: HashSet<&String> = state.entries.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), state.entries.len());
        assert!(state.entries.iter().all(|(k, e)| k == &e.key));
    }
}

/// 检查点条目的重放顺序
///
/// 不在访问顺序列表中的条目按 last_accessed 排在最前（最久未使用），
/// 其余按记录的 LRU → MRU 顺序；重复 key 与悬空的顺序记录被忽略
fn replay_order(checkpoint: CacheCheckpoint) -> Vec<CacheEntry> {
    let mut by_key: HashMap<String, CacheEntry> = HashMap::with_capacity(checkpoint.entries.len());
    for entry in checkpoint.entries {
        by_key.entry(entry.key.clone()).or_insert(entry);
    }

    let ordered: HashSet<&String> = checkpoint.access_order.iter().collect();
    let mut unordered: Vec<CacheEntry> = Vec::new();
    let keys: Vec<String> = by_key.keys().cloned().collect();
    for key in keys {
        if !ordered.contains(&key) {
            if let Some(entry) = by_key.remove(&key) {
                unordered.push(entry);
            }
        }
    }
    unordered.sort_by_key(|entry| entry.last_accessed);

    let mut replay = unordered;
    for key in &checkpoint.access_order {
        if let Some(entry) = by_key.remove(key) {
            replay.push(entry);
        }
    }
    replay
}

#[async_trait]
impl ContentCachePort for DiskContentCache {
    async fn get(&self, key: &str) -> Option<CacheHandle> {
        let mut state = self.state.lock().await;
        self.lookup_locked(&mut state, key).await
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<CacheHandle, CacheError> {
        let size = data.len() as u64;
        let mut state = self.state.lock().await;

        if state.entries.contains(key) {
            if let Some(handle) = self.lookup_locked(&mut state, key).await {
                tracing::debug!(key = %key, "Content already cached");
                return Ok(handle);
            }
            if state.entries.contains(key) {
                // 已有条目的 blob 状态未知，不能覆盖
                return Err(CacheError::StorageError(
                    "existing cache blob is unreachable".to_string(),
                ));
            }
        }

        if size > self.config.max_size_bytes {
            tracing::warn!(
                key = %key,
                size_bytes = size,
                max_size_bytes = self.config.max_size_bytes,
                "Rejected blob larger than cache limit"
            );
            return Err(CacheError::EntryTooLarge {
                size,
                max: self.config.max_size_bytes,
            });
        }

        self.make_room_locked(&mut state, size, 1).await;

        let id = EntryId::new();
        if let Err(e) = self.storage.write(&id, &data).await {
            tracing::warn!(key = %key, error = %e, "Failed to write cache blob");
            if state.dirty {
                self.save_locked(&mut state).await;
            }
            return Err(CacheError::StorageError(e.to_string()));
        }

        let now = Utc::now();
        let entry = CacheEntry {
            id,
            key: key.to_string(),
            size,
            hits: 0,
            last_accessed: now,
            created: now,
            display_path: self.storage.display_path(&id),
        };
        let handle = CacheHandle::from_entry(&entry);
        state.insert(entry);
        state.dirty = true;
        self.save_locked(&mut state).await;

        tracing::debug!(
            key = %key,
            size_bytes = size,
            total_size = state.total_size,
            "Content cached"
        );
        Ok(handle)
    }

    async fn read(&self, handle: &CacheHandle) -> Option<Vec<u8>> {
        let mut state = self.state.lock().await;
        match state.entries.peek(&handle.key) {
            Some(entry) if entry.id == handle.entry_id => {}
            _ => return None,
        }

        match self.storage.read(&handle.entry_id).await {
            Ok(data) => Some(data),
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(key = %handle.key, "Cache entry lost its blob, purging");
                state.detach(&handle.key);
                self.publish_evicted(&handle.key, CacheEvictionReason::MissingBlob);
                None
            }
            Err(e) => {
                tracing::warn!(key = %handle.key, error = %e, "Failed to read cache blob");
                None
            }
        }
    }

    async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.entries.contains(key)
    }

    async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.detach(key) else {
            return false;
        };

        self.delete_blob(&entry).await;
        self.save_locked(&mut state).await;
        tracing::debug!(key = %key, "Cache entry removed");
        true
    }

    async fn clear(&self) {
        let mut state = self.state.lock().await;
        let entries: Vec<CacheEntry> = state.entries.iter().map(|(_, e)| e.clone()).collect();
        for entry in &entries {
            self.delete_blob(entry).await;
        }

        *state = CacheState::new();
        self.save_locked(&mut state).await;

        tracing::info!(removed = entries.len(), "Content cache cleared");
        if let Some(events) = &self.events {
            events.publish(PlaybackEvent::CacheCleared);
        }
    }

    async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let now = Utc::now();
        let entry_count = state.entries.len();
        let average_age_secs = if entry_count == 0 {
            0.0
        } else {
            let total_ms: i64 = state
                .entries
                .iter()
                .map(|(_, e)| (now - e.created).num_milliseconds().max(0))
                .sum();
            total_ms as f64 / 1000.0 / entry_count as f64
        };

        CacheStats {
            entry_count,
            total_size: state.total_size,
            max_size: self.config.max_size_bytes,
            max_entries: self.config.max_entries,
            hit_count: state.hit_count,
            miss_count: state.miss_count,
            hit_rate: CacheStats::compute_hit_rate(state.hit_count, state.miss_count),
            eviction_count: state.eviction_count,
            average_age_secs,
        }
    }

    async fn warm_cache(&self, items: Vec<WarmItem>) -> WarmReport {
        let mut report = WarmReport::default();
        for item in items {
            let key = item.key();
            match self.put(&key, item.data).await {
                Ok(_) => report.stored += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to warm cache entry");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(stored = report.stored, failed = report.failed, "Cache warmed");
        report
    }

    async fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now()).await
    }

    async fn dispose(&self) {
        if let Some(task) = self.maintenance.lock().await.take() {
            task.stop().await;
        }

        let mut state = self.state.lock().await;
        self.save_locked(&mut state).await;
        tracing::info!(entries = state.entries.len(), "Content cache disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::fingerprint;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        config: DiskCacheConfig,
        storage: Arc<FileBlobStorage>,
    }

    impl Fixture {
        async fn new(max_size_bytes: u64, max_entries: usize) -> Self {
            let dir = tempdir().unwrap();
            let config = DiskCacheConfig {
                cache_dir: dir.path().join("cache"),
                max_size_bytes,
                max_entries,
                ttl: Duration::from_secs(24 * 3600),
                cleanup_interval: Duration::from_secs(3600),
                io_timeout: Duration::from_secs(5),
            };
            let storage = Arc::new(
                FileBlobStorage::new(&config.cache_dir, config.io_timeout)
                    .await
                    .unwrap(),
            );
            Self {
                _dir: dir,
                config,
                storage,
            }
        }

        async fn open(&self) -> DiskContentCache {
            DiskContentCache::open_with_storage(self.config.clone(), self.storage.clone())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_put_get_read() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;
        let key = fingerprint("hello", Some("v1"), Some("en"));

        let handle = cache.put(&key, vec![1, 2, 3, 4, 5]).await.unwrap();
        assert_eq!(handle.size, 5);
        assert!(handle.display_path.starts_with("[BLOB:"));

        let found = cache.get(&key).await.unwrap();
        assert_eq!(found.entry_id, handle.entry_id);
        assert_eq!(cache.read(&found).await.unwrap(), vec![1, 2, 3, 4, 5]);

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.hit_rate, 1.0);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;

        let first = cache.put("k", vec![7; 60]).await.unwrap();
        let second = cache.put("k", vec![7; 60]).await.unwrap();

        assert_eq!(first.entry_id, second.entry_id);
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 60);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(fixture.storage.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_size_budget_evicts_lru() {
        let fixture = Fixture::new(100, 10).await;
        let cache = fixture.open().await;

        let k1 = cache.put("k1", vec![0; 60]).await.unwrap();
        cache.put("k2", vec![0; 50]).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.total_size, 50);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.eviction_count, 1);
        assert!(!cache.contains("k1").await);
        assert!(cache.contains("k2").await);
        assert!(!fixture.storage.exists(&k1.entry_id).await.unwrap());
        cache.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_get_refreshes_recency() {
        let fixture = Fixture::new(100, 10).await;
        let cache = fixture.open().await;

        cache.put("k1", vec![0; 40]).await.unwrap();
        cache.put("k2", vec![0; 40]).await.unwrap();
        assert!(cache.get("k1").await.is_some());
        cache.put("k3", vec![0; 40]).await.unwrap();

        assert!(cache.contains("k1").await);
        assert!(!cache.contains("k2").await);
        assert!(cache.contains("k3").await);
    }

    #[tokio::test]
    async fn test_entry_count_budget() {
        let fixture = Fixture::new(1024, 2).await;
        let cache = fixture.open().await;

        cache.put("a", vec![1]).await.unwrap();
        cache.put("b", vec![2]).await.unwrap();
        cache.put("c", vec![3]).await.unwrap();

        assert!(cache.get("a").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.eviction_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_oversized_blob_is_rejected() {
        let fixture = Fixture::new(100, 10).await;
        let cache = fixture.open().await;
        cache.put("small", vec![0; 10]).await.unwrap();

        let result = cache.put("big", vec![0; 101]).await;
        assert!(matches!(
            result,
            Err(CacheError::EntryTooLarge { size: 101, max: 100 })
        ));
        assert!(cache.contains("small").await);
        assert_eq!(cache.stats().await.total_size, 10);
    }

    #[tokio::test]
    async fn test_missing_blob_is_a_miss() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;
        let handle = cache.put("k", vec![1, 2, 3]).await.unwrap();
        cache.put("other", vec![4]).await.unwrap();

        std::fs::remove_file(fixture.storage.blob_path(&handle.entry_id)).unwrap();

        assert!(cache.get("k").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 1);
        assert_eq!(stats.miss_count, 1);
        assert!(cache.read(&handle).await.is_none());
    }

    #[tokio::test]
    async fn test_put_rewrites_entry_with_missing_blob() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;
        let first = cache.put("k", vec![1, 2, 3]).await.unwrap();
        std::fs::remove_file(fixture.storage.blob_path(&first.entry_id)).unwrap();

        let second = cache.put("k", vec![1, 2, 3]).await.unwrap();
        assert_ne!(first.entry_id, second.entry_id);
        assert_eq!(cache.read(&second).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.stats().await.total_size, 3);
    }

    #[tokio::test]
    async fn test_remove() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;
        let handle = cache.put("k", vec![1, 2, 3]).await.unwrap();

        assert!(!cache.remove("unknown").await);
        assert_eq!(cache.stats().await.entry_count, 1);

        assert!(cache.remove("k").await);
        assert!(!fixture.storage.exists(&handle.entry_id).await.unwrap());
        assert_eq!(cache.stats().await.total_size, 0);
        assert!(!cache.remove("k").await);
    }

    #[tokio::test]
    async fn test_clear_resets_counters() {
        let fixture = Fixture::new(100, 10).await;
        let cache = fixture.open().await;
        cache.put("a", vec![0; 60]).await.unwrap();
        cache.put("b", vec![0; 60]).await.unwrap();
        cache.get("b").await;
        cache.get("missing").await;

        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!(stats, CacheStats {
            max_size: 100,
            max_entries: 10,
            ..CacheStats::default()
        });
        assert!(fixture.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warm_cache_isolates_failures() {
        let fixture = Fixture::new(100, 10).await;
        let cache = fixture.open().await;

        let items = vec![
            WarmItem {
                content: "one".to_string(),
                voice: None,
                language: None,
                data: vec![1; 10],
            },
            WarmItem {
                content: "too big".to_string(),
                voice: None,
                language: None,
                data: vec![2; 500],
            },
            WarmItem {
                content: "two".to_string(),
                voice: Some("v2".to_string()),
                language: Some("fr".to_string()),
                data: vec![3; 10],
            },
        ];

        let report = cache.warm_cache(items).await;
        assert_eq!(report, WarmReport { stored: 2, failed: 1 });
        assert!(cache.contains(&fingerprint("one", None, None)).await);
        assert!(cache.contains(&fingerprint("two", Some("v2"), Some("fr"))).await);
    }

    #[tokio::test]
    async fn test_cleanup_respects_ttl() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await;
        let handle = cache.put("fresh", vec![1]).await.unwrap();
        cache.get("fresh").await;

        assert_eq!(cache.cleanup().await, 0);
        assert!(cache.contains("fresh").await);

        let later = Utc::now() + chrono::Duration::days(2);
        assert_eq!(cache.cleanup_at(later).await, 1);
        assert!(!cache.contains("fresh").await);
        assert!(!fixture.storage.exists(&handle.entry_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_recovery_from_checkpoint() {
        let fixture = Fixture::new(1024, 10).await;
        let (lost, kept) = {
            let cache = fixture.open().await;
            let lost = cache.put("lost", vec![1; 10]).await.unwrap();
            let kept = cache.put("kept", vec![2; 20]).await.unwrap();
            cache.dispose().await;
            (lost, kept)
        };

        std::fs::remove_file(fixture.storage.blob_path(&lost.entry_id)).unwrap();
        // 文件被外部改大，总大小应以实际文件为准
        std::fs::write(fixture.storage.blob_path(&kept.entry_id), vec![2; 25]).unwrap();

        let cache = fixture.open().await;
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 25);
        assert!(cache.get("lost").await.is_none());
        assert_eq!(cache.get("kept").await.unwrap().entry_id, kept.entry_id);
        cache.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_recovery_preserves_access_order_and_evictions() {
        let fixture = Fixture::new(100, 10).await;
        {
            let cache = fixture.open().await;
            cache.put("a", vec![0; 30]).await.unwrap();
            cache.put("b", vec![0; 30]).await.unwrap();
            cache.put("c", vec![0; 30]).await.unwrap();
            cache.get("a").await;
            cache.put("d", vec![0; 30]).await.unwrap();
            cache.dispose().await;
        }

        let cache = fixture.open().await;
        assert_eq!(cache.stats().await.eviction_count, 1);
        assert!(!cache.contains("b").await);

        // c 是最久未使用的
        cache.put("e", vec![0; 30]).await.unwrap();
        assert!(!cache.contains("c").await);
        assert!(cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_starts_empty() {
        let fixture = Fixture::new(1024, 10).await;
        let id = EntryId::new();
        fixture.storage.write(&id, b"orphan").await.unwrap();
        std::fs::write(fixture.config.cache_dir.join("metadata.json"), b"{ broken").unwrap();

        let cache = fixture.open().await;
        assert_eq!(cache.stats().await.entry_count, 0);
        assert!(!fixture.storage.exists(&id).await.unwrap());

        cache.put("k", vec![1]).await.unwrap();
        assert!(cache.contains("k").await);
    }

    #[tokio::test]
    async fn test_recovery_removes_partial_writes() {
        let fixture = Fixture::new(1024, 10).await;
        let partial = fixture.config.cache_dir.join(format!("{}.bin.tmp", EntryId::new()));
        std::fs::write(&partial, b"half written").unwrap();

        let _cache = fixture.open().await;
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn test_recovery_applies_shrunk_budget() {
        let mut fixture = Fixture::new(1024, 10).await;
        {
            let cache = fixture.open().await;
            for key in ["a", "b", "c"] {
                cache.put(key, vec![0; 10]).await.unwrap();
            }
            cache.dispose().await;
        }

        fixture.config.max_entries = 2;
        let cache = fixture.open().await;
        assert_eq!(cache.stats().await.entry_count, 2);
        assert!(!cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_expired_entries() {
        let fixture = Fixture::new(1024, 10).await;
        let old_id = EntryId::new();
        fixture.storage.write(&old_id, b"old").await.unwrap();
        let created = Utc::now() - chrono::Duration::days(3);
        let checkpoint = CacheCheckpoint {
            entries: vec![CacheEntry {
                id: old_id,
                key: "old".to_string(),
                size: 3,
                hits: 9,
                last_accessed: Utc::now(),
                created,
                display_path: fixture.storage.display_path(&old_id),
            }],
            access_order: vec!["old".to_string()],
            total_size: 3,
            eviction_count: 0,
            saved_at: Some(Utc::now()),
        };
        CheckpointFile::new(&fixture.config.cache_dir, Duration::from_secs(5))
            .save(&checkpoint)
            .await
            .unwrap();

        let cache = fixture.open().await;
        cache.put("new", vec![1]).await.unwrap();
        assert_eq!(cache.stats().await.entry_count, 2);

        assert_eq!(cache.cleanup().await, 1);
        assert!(!cache.contains("old").await);
        assert!(cache.contains("new").await);
        assert!(!fixture.storage.exists(&old_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_maintenance_expires_entries() {
        let mut fixture = Fixture::new(1024, 10).await;
        fixture.config.ttl = Duration::from_millis(10);
        fixture.config.cleanup_interval = Duration::from_millis(20);
        let cache = fixture.open().await.arc();

        cache.put("short-lived", vec![1]).await.unwrap();
        cache.start_maintenance().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.stats().await.entry_count, 0);
        cache.dispose().await;
    }

    #[tokio::test]
    async fn test_dispose_writes_checkpoint() {
        let fixture = Fixture::new(1024, 10).await;
        let cache = fixture.open().await.arc();
        cache.start_maintenance().await;
        cache.put("k", vec![1, 2]).await.unwrap();
        cache.get("k").await;

        cache.dispose().await;

        let checkpoint = CheckpointFile::new(&fixture.config.cache_dir, Duration::from_secs(5))
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.entries.len(), 1);
        assert_eq!(checkpoint.entries[0].hits, 1);
        assert_eq!(checkpoint.access_order, vec!["k".to_string()]);
        assert!(cache.maintenance.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_puts_keep_accounting_consistent() {
        let fixture = Fixture::new(200, 15).await;
        let cache = fixture.open().await.arc();

        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    let key = format!("{}-{}", t, i);
                    cache.put(&key, vec![0; 10 + i]).await.unwrap();
                    cache.get(&key).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats().await;
        assert!(stats.total_size <= 200);
        assert!(stats.entry_count <= 15);
        cache.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_events_on_eviction() {
        let fixture = Fixture::new(100, 10).await;
        let events = EventPublisher::new().arc();
        let mut rx = events.subscribe();
        let cache = fixture.open().await.with_event_publisher(events);

        cache.put("k1", vec![0; 60]).await.unwrap();
        cache.put("k2", vec![0; 60]).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            PlaybackEvent::CacheEntryEvicted {
                key: "k1".to_string(),
                reason: CacheEvictionReason::Lru,
            }
        );
    }

    /// 可切换为 IO 超时的存储
    struct FlakyStorage {
        inner: Arc<FileBlobStorage>,
        failing: AtomicBool,
    }

    impl FlakyStorage {
        fn new(inner: Arc<FileBlobStorage>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                failing: AtomicBool::new(false),
            })
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StorageError::Timeout(5))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BlobStoragePort for FlakyStorage {
        async fn write(&self, id: &EntryId, data: &[u8]) -> Result<u64, StorageError> {
            self.check()?;
            self.inner.write(id, data).await
        }

        async fn read(&self, id: &EntryId) -> Result<Vec<u8>, StorageError> {
            self.check()?;
            self.inner.read(id).await
        }

        async fn exists(&self, id: &EntryId) -> Result<bool, StorageError> {
            self.check()?;
            self.inner.exists(id).await
        }

        async fn size(&self, id: &EntryId) -> Result<u64, StorageError> {
            self.check()?;
            self.inner.size(id).await
        }

        async fn delete(&self, id: &EntryId) -> Result<(), StorageError> {
            self.inner.delete(id).await
        }

        async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError> {
            self.inner.list_files().await
        }

        async fn remove_partial(&self, path: &std::path::Path) -> Result<(), StorageError> {
            self.inner.remove_partial(path).await
        }

        fn display_path(&self, id: &EntryId) -> String {
            self.inner.display_path(id)
        }
    }

    #[tokio::test]
    async fn test_empty_blobs_respect_entry_count_budget() {
        let fixture = Fixture::new(1024, 2).await;
        let cache = fixture.open().await;

        for key in ["a", "b", "c", "d"] {
            cache.put(key, Vec::new()).await.unwrap();
        }

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.eviction_count, 2);
        assert!(cache.contains("c").await);
        assert!(cache.contains("d").await);
        assert_eq!(fixture.storage.list_files().await.unwrap().len(), 2);
        cache.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_recovery_keeps_entry_when_blob_stat_fails() {
        let fixture = Fixture::new(1024, 10).await;
        let handle = {
            let cache = fixture.open().await;
            let handle = cache.put("k", vec![5; 8]).await.unwrap();
            cache.dispose().await;
            handle
        };

        let flaky = FlakyStorage::new(fixture.storage.clone());
        flaky.set_failing(true);
        let cache = DiskContentCache::open_with_storage(fixture.config.clone(), flaky.clone())
            .await
            .unwrap();

        assert!(cache.contains("k").await);
        assert_eq!(cache.stats().await.total_size, 8);
        assert!(fixture.storage.blob_path(&handle.entry_id).exists());

        flaky.set_failing(false);
        let found = cache.get("k").await.unwrap();
        assert_eq!(found.entry_id, handle.entry_id);
        assert_eq!(cache.read(&found).await.unwrap(), vec![5; 8]);
    }

    #[tokio::test]
    async fn test_unreachable_blob_is_a_miss_without_purge() {
        let fixture = Fixture::new(1024, 10).await;
        let flaky = FlakyStorage::new(fixture.storage.clone());
        let cache = DiskContentCache::open_with_storage(fixture.config.clone(), flaky.clone())
            .await
            .unwrap();
        let handle = cache.put("k", vec![1, 2, 3]).await.unwrap();

        flaky.set_failing(true);
        assert!(cache.get("k").await.is_none());
        assert!(cache.contains("k").await);
        assert!(matches!(
            cache.put("k", vec![1, 2, 3]).await,
            Err(CacheError::StorageError(_))
        ));

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 3);
        assert_eq!(stats.miss_count, 2);
        assert!(fixture.storage.blob_path(&handle.entry_id).exists());

        flaky.set_failing(false);
        assert_eq!(cache.get("k").await.unwrap().entry_id, handle.entry_id);
        cache.assert_consistent().await;
    }
}
