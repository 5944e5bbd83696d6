//! Content Cache Port - 内容缓存管理
//!
//! 定义内容缓存的抽象接口，具体实现使用本地文件 + JSON 元数据检查点

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// 未指定音色时的默认值
pub const DEFAULT_VOICE: &str = "default";
/// 未指定语言时的默认值
pub const DEFAULT_LANGUAGE: &str = "en";

/// Content Cache 错误
///
/// 只有 `EntryTooLarge` 属于调用方契约，其余存储错误在组件内部吸收并记录日志
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Entry of {size} bytes exceeds cache limit of {max} bytes")]
    EntryTooLarge { size: u64, max: u64 },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 缓存条目存储 id（与缓存 key 不同，用作 blob 文件名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 缓存条目元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: EntryId,
    pub key: String,
    pub size: u64,
    #[serde(default)]
    pub hits: u64,
    pub last_accessed: DateTime<Utc>,
    pub created: DateTime<Utc>,
    /// 脱敏后的展示路径（不是真实存储路径）
    #[serde(default)]
    pub display_path: String,
}

/// 缓存句柄
///
/// 通过 `ContentCachePort::read` 读取 blob；`reference()` 可写入播放条目的 reference 字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHandle {
    pub entry_id: EntryId,
    pub key: String,
    pub size: u64,
    pub display_path: String,
}

impl CacheHandle {
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            entry_id: entry.id,
            key: entry.key.clone(),
            size: entry.size,
            display_path: entry.display_path.clone(),
        }
    }

    /// 不透明引用串
    pub fn reference(&self) -> String {
        format!("cache:{}", self.entry_id)
    }
}

/// 预热条目
#[derive(Debug, Clone)]
pub struct WarmItem {
    pub content: String,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub data: Vec<u8>,
}

impl WarmItem {
    pub fn key(&self) -> String {
        fingerprint(&self.content, self.voice.as_deref(), self.language.as_deref())
    }
}

/// 预热结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub stored: usize,
    pub failed: usize,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size: u64,
    pub max_size: u64,
    pub max_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    /// hits / (hits + misses)，无请求时为 0
    pub hit_rate: f64,
    pub eviction_count: u64,
    /// 条目平均存活时间（秒）
    pub average_age_secs: f64,
}

impl CacheStats {
    pub fn compute_hit_rate(hit_count: u64, miss_count: u64) -> f64 {
        let total = hit_count + miss_count;
        if total == 0 {
            0.0
        } else {
            hit_count as f64 / total as f64
        }
    }
}

/// Content Cache Port
///
/// 基于内容指纹的持久化 LRU + TTL 缓存
/// - 缓存 key: sha256(content|voice|language)
/// - 容量受字节数和条目数双重限制
#[async_trait]
pub trait ContentCachePort: Send + Sync {
    /// 查找缓存
    ///
    /// 命中时更新访问信息（LRU touch）；元数据存在但 blob 丢失时按未命中处理并清除条目
    async fn get(&self, key: &str) -> Option<CacheHandle>;

    /// 存储 blob
    ///
    /// key 已存在时直接返回已有句柄（幂等）；单个 blob 超过容量上限时返回 `EntryTooLarge`
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<CacheHandle, CacheError>;

    /// 读取句柄对应的 blob
    async fn read(&self, handle: &CacheHandle) -> Option<Vec<u8>>;

    /// 检查 key 是否存在（不影响 LRU 顺序和命中统计）
    async fn contains(&self, key: &str) -> bool;

    /// 删除缓存条目
    async fn remove(&self, key: &str) -> bool;

    /// 清空缓存并重置所有计数
    async fn clear(&self);

    /// 获取缓存统计信息
    async fn stats(&self) -> CacheStats;

    /// 批量写入，单条失败不影响其余条目
    async fn warm_cache(&self, items: Vec<WarmItem>) -> WarmReport;

    /// 清理过期条目，返回清理数量
    async fn cleanup(&self) -> usize;

    /// 停止后台维护任务并写入最终检查点
    async fn dispose(&self);
}

/// 生成缓存 key
///
/// sha256(content|voice|language)，voice 默认 "default"，language 默认 "en"
pub fn fingerprint(content: &str, voice: Option<&str>, language: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"|");
    hasher.update(voice.unwrap_or(DEFAULT_VOICE).as_bytes());
    hasher.update(b"|");
    hasher.update(language.unwrap_or(DEFAULT_LANGUAGE).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint("hello", Some("v1"), Some("en"));
        let b = fingerprint("hello", Some("v1"), Some("en"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_depends_on_language_and_voice() {
        let en = fingerprint("hello", Some("v1"), Some("en"));
        assert_ne!(en, fingerprint("hello", Some("v1"), Some("fr")));
        assert_ne!(en, fingerprint("hello", Some("v2"), Some("en")));
        assert_ne!(en, fingerprint("hello!", Some("v1"), Some("en")));
    }

    #[test]
    fn test_fingerprint_defaults() {
        assert_eq!(
            fingerprint("hello", None, None),
            fingerprint("hello", Some(DEFAULT_VOICE), Some(DEFAULT_LANGUAGE))
        );
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::compute_hit_rate(0, 0), 0.0);
        assert_eq!(CacheStats::compute_hit_rate(3, 1), 0.75);
    }

    #[test]
    fn test_handle_reference_is_opaque() {
        let entry = CacheEntry {
            id: EntryId::new(),
            key: fingerprint("x", None, None),
            size: 3,
            hits: 0,
            last_accessed: Utc::now(),
            created: Utc::now(),
            display_path: "[BLOB:000000000000]".to_string(),
        };
        let handle = CacheHandle::from_entry(&entry);
        assert_eq!(handle.reference(), format!("cache:{}", entry.id));
        assert!(!handle.reference().contains('/'));
    }
}
