//! Playback Context - 播放条目领域模型

mod entities;
mod value_objects;

pub use entities::{
    ItemMetadata, NewPlayableItem, PlayableItem, DEFAULT_CONTENT_MAX_CHARS,
    DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS,
};
pub use value_objects::{ContentSource, ItemId, ItemStatus, Priority};
