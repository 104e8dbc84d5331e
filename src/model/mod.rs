//! Model module - playback state and data types
//!
//! - `types`: core type definitions (items, statuses, modes, actions)
//! - `cache`: bounded FIFO cache for extracted items and media
//! - `modes`: track-advance strategies, one per mode
//! - `playlist`: the ordered track list and its cursor

mod cache;
mod modes;
mod playlist;
mod types;

pub use types::{Action, ActionKind, JobClass, Mode, Payload, PlaybackStatus, PlaylistItem};

pub use cache::{BoundedCache, Cache, cache_key};

pub use modes::{ModeTable, Normal, PlaybackMode, RepeatAll, RepeatOne, Shuffle, TrackSwitch};

pub use playlist::{FetchFn, Playlist};
