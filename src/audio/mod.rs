//! Audio backend contract
//!
//! The decoding/output engine is an external collaborator. This module fixes
//! the seams between it and the core:
//!
//! - `Player`: the playback-control surface the playlist and controller use
//! - `AudioEngine` / `AudioStream`: what a concrete engine must provide
//! - `Deck`: the live stream plus its control fields, guarded by the
//!   engine-wide playback lock that the output driver also takes
//! - `Completion`: the one-shot end-of-stream signal

mod control;
mod silent;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;

use crate::model::{Payload, PlaybackStatus};

pub use control::PlayerControl;
pub use silent::SilentEngine;

pub const DEFAULT_VOLUME_PERCENT: u8 = 70;
pub const MAX_VOLUME_PERCENT: u8 = 100;

/// Called (from a dispatcher task, never the output thread) when a loaded
/// stream reaches its natural end.
pub type EndOfStreamCallback = Arc<dyn Fn() + Send + Sync>;

/// Playback-control capability
pub trait Player: Send + Sync {
    fn volume_up(&self);
    fn volume_down(&self);
    /// Toggles mute
    fn mute(&self);
    /// Relative seek in seconds. Ignored unless playing or paused.
    fn seek(&self, delta_secs: i64);
    /// Absolute seek. Ignored unless playing or paused.
    fn seek_to(&self, position: Duration);
    /// Replaces the active stream and starts playing it
    fn load(&self, payload: Payload) -> crate::error::Result<()>;
    /// Restarts the loaded stream from the beginning
    fn reload(&self);
    fn pause(&self);
    /// Toggles between playing and paused
    fn play(&self);
    /// Pause plus rewind
    fn stop(&self);
    /// Drops the active stream entirely
    fn clear_stream(&self);
    /// Reads the status; a pending seek/skip overlay is returned once
    fn status(&self) -> PlaybackStatus;
    /// Accepts only skip-forward/skip-backward
    fn set_status(&self, status: PlaybackStatus);
    /// Ends a pending track switch whose fetch failed, so `play` works again
    fn end_switch(&self);
    fn on_end_of_stream(&self, callback: EndOfStreamCallback);
}

/// Decoded stream as consumed by the output driver
pub trait AudioStream: Send {
    /// Fills `out` with interleaved samples, returns how many were written.
    /// Zero means the stream is exhausted.
    fn read(&mut self, out: &mut [f32]) -> usize;
    fn position(&self) -> Duration;
    fn duration(&self) -> Duration;
    fn seek(&mut self, position: Duration) -> Result<()>;
}

/// Decoding/output engine
pub trait AudioEngine: Send + Sync {
    /// Turns a payload into a stream. Runs outside the playback lock.
    fn decode(&self, payload: Payload) -> Result<Box<dyn AudioStream>>;

    /// Hands the shared deck to the output driver. Called once.
    fn attach(&self, deck: SharedDeck);
}

/// One-shot end-of-stream signal, fired by the output driver
pub struct Completion(oneshot::Sender<()>);

impl Completion {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Must be called after the deck lock has been released.
    pub fn complete(self) {
        let _ = self.0.send(());
    }
}

/// The live stream and its control fields.
///
/// Every access goes through [`SharedDeck`]'s mutex, which is the
/// engine-wide playback lock.
pub struct Deck {
    stream: Option<Box<dyn AudioStream>>,
    paused: bool,
    volume: u8,
    muted: bool,
    completion: Option<Completion>,
}

pub type SharedDeck = Arc<Mutex<Deck>>;

impl Deck {
    pub fn new() -> Self {
        Self {
            stream: None,
            paused: true,
            volume: DEFAULT_VOLUME_PERCENT,
            muted: false,
            completion: None,
        }
    }

    pub fn shared() -> SharedDeck {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_mut(&mut self) -> Option<&mut (dyn AudioStream + 'static)> {
        self.stream.as_deref_mut()
    }

    pub fn stream(&self) -> Option<&(dyn AudioStream + 'static)> {
        self.stream.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Linear gain the driver applies to samples
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            f32::from(self.volume) / f32::from(MAX_VOLUME_PERCENT)
        }
    }

    /// Taken by the driver when the stream runs dry
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    pub(crate) fn install(&mut self, stream: Box<dyn AudioStream>, completion: Completion) {
        self.stream = Some(stream);
        self.completion = Some(completion);
        self.paused = false;
    }

    pub(crate) fn rearm(&mut self, completion: Completion) {
        self.completion = Some(completion);
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub(crate) fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME_PERCENT);
    }

    pub(crate) fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub(crate) fn eject(&mut self) {
        self.stream = None;
        self.completion = None;
        self.paused = true;
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}
