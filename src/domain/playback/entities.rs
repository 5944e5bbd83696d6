//! Playback Context - Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{ContentSource, ItemId, ItemStatus, Priority};
use crate::domain::sanitizer::{sanitize, sanitize_opt, sanitize_truncated};

/// 持久化时 content 的默认最大字符数
pub const DEFAULT_CONTENT_MAX_CHARS: usize = 1000;
/// 持久化时 title 的最大字符数
pub const TITLE_MAX_CHARS: usize = 200;
/// 持久化时 description 的最大字符数
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// 播放条目元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: ContentSource,
    /// 来源引用（调用方已抽象，不是原始路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub voice_id: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    /// 抽象后的展示路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_path: Option<String>,
}

impl ItemMetadata {
    pub fn new(
        title: impl Into<String>,
        source: ContentSource,
        voice_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            source,
            source_ref: None,
            duration_ms: None,
            voice_id: voice_id.into(),
            language: language.into(),
            created_at: Utc::now(),
            display_path: None,
        }
    }

    fn to_persisted(&self) -> Self {
        Self {
            title: sanitize_truncated(&self.title, TITLE_MAX_CHARS),
            description: self
                .description
                .as_deref()
                .map(|d| sanitize_truncated(d, DESCRIPTION_MAX_CHARS)),
            source: self.source,
            source_ref: sanitize_opt(self.source_ref.as_deref()),
            duration_ms: self.duration_ms,
            voice_id: self.voice_id.clone(),
            language: self.language.clone(),
            created_at: self.created_at,
            display_path: sanitize_opt(self.display_path.as_deref()),
        }
    }
}

/// 待入队的条目（id 与 added_at 由队列分配）
#[derive(Debug, Clone)]
pub struct NewPlayableItem {
    pub content: String,
    pub metadata: ItemMetadata,
    pub priority: Priority,
    pub status: ItemStatus,
    pub reference: Option<String>,
}

impl NewPlayableItem {
    pub fn new(content: impl Into<String>, metadata: ItemMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            priority: Priority::Normal,
            status: ItemStatus::Pending,
            reference: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// 播放条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub id: ItemId,
    pub content: String,
    pub metadata: ItemMetadata,
    pub priority: Priority,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl PlayableItem {
    pub fn from_new(id: ItemId, added_at: DateTime<Utc>, new: NewPlayableItem) -> Self {
        Self {
            id,
            content: new.content,
            metadata: new.metadata,
            priority: new.priority,
            status: new.status,
            reference: new.reference,
            progress: 0.0,
            error: None,
            added_at,
        }
    }

    /// 设置进度，限制在 [0, 1]，NaN 视为 0
    pub fn set_progress(&mut self, progress: f64) {
        self.progress = clamp_progress(progress);
    }

    /// 生成持久化副本
    ///
    /// 自由文本全部脱敏，content 截断到 `content_max_chars`；内存中的原条目不受影响。
    pub fn to_persisted(&self, content_max_chars: usize) -> Self {
        Self {
            id: self.id,
            content: sanitize_truncated(&self.content, content_max_chars),
            metadata: self.metadata.to_persisted(),
            priority: self.priority,
            status: self.status,
            reference: self.reference.clone(),
            progress: self.progress,
            error: self.error.as_deref().map(sanitize),
            added_at: self.added_at,
        }
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}
