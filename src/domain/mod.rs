//! Domain Layer - 领域层
//!
//! - Playback Context: 播放条目、优先级、状态
//! - Sanitizer: 对外输出文本的脱敏规则

pub mod playback;
pub mod sanitizer;
