//! Core type definitions for the playback core

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A playable entry produced by page extraction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Fetchable locator of the audio payload
    pub path: String,
    pub title: String,
    pub artist: String,
    pub track_artist: String,
    pub album: String,
    pub tags: Vec<String>,
    /// Seconds, 0.0 when unknown
    pub duration: f64,
    pub track_number: u32,
    pub total_tracks: u32,
    pub streaming: bool,
    pub unreleased: bool,
}

impl PlaylistItem {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            streaming: true,
            ..Default::default()
        }
    }
}

/// Raw audio bytes as downloaded
pub type Payload = Arc<[u8]>;

/// Playback status as seen by the UI.
///
/// The seek and skip values are transient overlays: they are returned by a
/// single status read and then collapse back to stopped/playing/paused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
    SeekBackward,
    SeekForward,
    SkipBackward,
    SkipForward,
}

impl PlaybackStatus {
    pub fn is_overlay(self) -> bool {
        matches!(
            self,
            Self::SeekBackward | Self::SeekForward | Self::SkipBackward | Self::SkipForward
        )
    }

    pub fn is_skip(self) -> bool {
        matches!(self, Self::SkipBackward | Self::SkipForward)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::SeekBackward => "seeking backward",
            Self::SeekForward => "seeking forward",
            Self::SkipBackward => "skipping backward",
            Self::SkipForward => "skipping forward",
        };
        f.write_str(s)
    }
}

/// Track-advance policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    #[default]
    Normal,
    RepeatAll,
    RepeatOne,
    Shuffle,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Normal, Mode::RepeatAll, Mode::RepeatOne, Mode::Shuffle];

    pub fn next(self) -> Self {
        match self {
            Mode::Normal => Mode::RepeatAll,
            Mode::RepeatAll => Mode::RepeatOne,
            Mode::RepeatOne => Mode::Shuffle,
            Mode::Shuffle => Mode::Normal,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Maps a raw mode number onto a mode. Out-of-range values become `Normal`.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Mode::Normal,
            1 => Mode::RepeatAll,
            2 => Mode::RepeatOne,
            3 => Mode::Shuffle,
            other => {
                tracing::debug!(value = other, "Unknown playback mode, using normal");
                Mode::Normal
            }
        }
    }

    /// Parses a mode name. Unknown names become `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Mode::Normal,
            "repeat-all" | "repeat_all" | "repeat" => Mode::RepeatAll,
            "repeat-one" | "repeat_one" | "one" => Mode::RepeatOne,
            "shuffle" | "random" => Mode::Shuffle,
            other => {
                tracing::debug!(value = other, "Unknown playback mode, using normal");
                Mode::Normal
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::RepeatAll => "repeat-all",
            Mode::RepeatOne => "repeat-one",
            Mode::Shuffle => "shuffle",
        }
    }
}

impl From<String> for Mode {
    fn from(name: String) -> Self {
        Mode::from_name(&name)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of cancellable background work
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobClass {
    /// Page locator to list of playable items
    Extraction,
    /// Media locator to raw bytes
    Download,
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobClass::Extraction => f.write_str("extraction"),
            JobClass::Download => f.write_str("download"),
        }
    }
}

/// What the application should do once a job has finished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Replace the playlist with the extracted items cached under the payload key
    StartPlayback,
    /// Load the media cached under the payload key
    Play,
}

/// Follow-up action enqueued by a successful job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub payload: String,
}

impl Action {
    pub fn start_playback(key: impl Into<String>) -> Self {
        Self { kind: ActionKind::StartPlayback, payload: key.into() }
    }

    pub fn play(key: impl Into<String>) -> Self {
        Self { kind: ActionKind::Play, payload: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycle_visits_all_modes() {
        let mut mode = Mode::Normal;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(seen, Mode::ALL.to_vec());
        assert_eq!(mode, Mode::Normal);
    }

    #[test]
    fn test_invalid_mode_values_normalize() {
        assert_eq!(Mode::from_raw(2), Mode::RepeatOne);
        assert_eq!(Mode::from_raw(-1), Mode::Normal);
        assert_eq!(Mode::from_raw(42), Mode::Normal);
        assert_eq!(Mode::from_name("Shuffle"), Mode::Shuffle);
        assert_eq!(Mode::from_name("sideways"), Mode::Normal);
    }

    #[test]
    fn test_mode_serde_uses_names() {
        let json = serde_json::to_string(&Mode::RepeatAll).unwrap();
        assert_eq!(json, "\"repeat-all\"");
        let mode: Mode = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(mode, Mode::Normal);
    }

    #[test]
    fn test_overlay_statuses() {
        assert!(PlaybackStatus::SkipForward.is_overlay());
        assert!(PlaybackStatus::SeekBackward.is_overlay());
        assert!(!PlaybackStatus::Paused.is_overlay());
        assert!(PlaybackStatus::SkipBackward.is_skip());
        assert!(!PlaybackStatus::SeekForward.is_skip());
    }
}
