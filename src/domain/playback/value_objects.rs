//! Playback Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 播放条目唯一标识
///
/// 创建时分配，不会复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 播放优先级
///
/// 声明顺序即排序顺序：`Low < Normal < High < Urgent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// 播放条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// 等待生成
    Pending,
    /// 正在生成/下载音频
    Downloading,
    /// 音频就绪
    Ready,
    /// 正在播放
    Playing,
    /// 已暂停
    Paused,
    /// 播放完成
    Completed,
    /// 失败
    Error,
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Ready => "ready",
            ItemStatus::Playing => "playing",
            ItemStatus::Paused => "paused",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        }
    }

    /// 终态（可被优先淘汰，也不会被 `get_next` 选中）
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }

    pub fn is_pending_like(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Downloading)
    }

    pub fn is_ready_like(&self) -> bool {
        matches!(self, ItemStatus::Ready | ItemStatus::Playing | ItemStatus::Paused)
    }
}

/// 内容来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    SynthesisResult,
    MemoryContent,
    Notification,
    AiResponse,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::SynthesisResult => "synthesis_result",
            ContentSource::MemoryContent => "memory_content",
            ContentSource::Notification => "notification",
            ContentSource::AiResponse => "ai_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn test_as_str_matches_serde_names() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::Downloading,
            ItemStatus::Ready,
            ItemStatus::Playing,
            ItemStatus::Paused,
            ItemStatus::Completed,
            ItemStatus::Error,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for priority in [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent] {
            let json = serde_json::to_string(&priority).unwrap();
            assert_eq!(json, format!("\"{}\"", priority.as_str()));
        }
        for source in [
            ContentSource::SynthesisResult,
            ContentSource::MemoryContent,
            ContentSource::Notification,
            ContentSource::AiResponse,
        ] {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
    }

    #[test]
    fn test_status_buckets() {
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Error.is_terminal());
        assert!(!ItemStatus::Paused.is_terminal());
        assert!(ItemStatus::Downloading.is_pending_like());
        assert!(ItemStatus::Paused.is_ready_like());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ContentSource::AiResponse).unwrap();
        assert_eq!(json, "\"ai_response\"");
        let priority: Priority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(priority, Priority::Urgent);
    }
}
