//! Playback mode strategies
//!
//! Each mode answers two different questions: where an explicit user
//! next/prev goes, and what happens when a track ends on its own. The two
//! differ on purpose: normal mode wraps on "next" but stops at the end of
//! the playlist, and repeat-one never moves on its own.

use rand::Rng;

use super::types::Mode;

/// Outcome of a natural end-of-stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackSwitch {
    /// Move the cursor to this index and fetch it
    Advance(usize),
    /// Restart the loaded stream, cursor unchanged
    Replay,
    /// Rewind the loaded stream and stay stopped
    Halt,
}

pub trait PlaybackMode: Send + Sync {
    fn kind(&self) -> Mode;

    fn next_track(&self, current: usize, total: usize) -> usize {
        if total == 0 {
            return current;
        }
        (current + 1) % total
    }

    fn prev_track(&self, current: usize, total: usize) -> usize {
        if total == 0 {
            return current;
        }
        (current % total + total - 1) % total
    }

    fn switch_track(&self, current: usize, total: usize) -> TrackSwitch;
}

pub struct Normal;

impl PlaybackMode for Normal {
    fn kind(&self) -> Mode {
        Mode::Normal
    }

    fn switch_track(&self, current: usize, total: usize) -> TrackSwitch {
        if current + 1 >= total {
            TrackSwitch::Halt
        } else {
            TrackSwitch::Advance(current + 1)
        }
    }
}

pub struct RepeatAll;

impl PlaybackMode for RepeatAll {
    fn kind(&self) -> Mode {
        Mode::RepeatAll
    }

    fn switch_track(&self, current: usize, total: usize) -> TrackSwitch {
        TrackSwitch::Advance(self.next_track(current, total))
    }
}

pub struct RepeatOne;

impl PlaybackMode for RepeatOne {
    fn kind(&self) -> Mode {
        Mode::RepeatOne
    }

    fn switch_track(&self, _current: usize, _total: usize) -> TrackSwitch {
        TrackSwitch::Replay
    }
}

pub struct Shuffle;

impl PlaybackMode for Shuffle {
    fn kind(&self) -> Mode {
        Mode::Shuffle
    }

    /// Uniform pick in `[0, total)` that is never `current` when `total >= 2`.
    fn next_track(&self, current: usize, total: usize) -> usize {
        if total < 2 {
            return current;
        }
        let mut rng = rand::rng();
        loop {
            let pick = rng.random_range(0..total);
            if pick != current {
                return pick;
            }
        }
    }

    // No history is kept: going back is another random pick.
    fn prev_track(&self, current: usize, total: usize) -> usize {
        self.next_track(current, total)
    }

    fn switch_track(&self, current: usize, total: usize) -> TrackSwitch {
        TrackSwitch::Advance(self.next_track(current, total))
    }
}

/// Mode strategies indexed by [`Mode`]. Built once and shared.
pub struct ModeTable {
    modes: [Box<dyn PlaybackMode>; 4],
}

impl ModeTable {
    pub fn new() -> Self {
        Self {
            modes: [
                Box::new(Normal),
                Box::new(RepeatAll),
                Box::new(RepeatOne),
                Box::new(Shuffle),
            ],
        }
    }

    pub fn get(&self, mode: Mode) -> &dyn PlaybackMode {
        self.modes[mode.index()].as_ref()
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        Self::new()
    }
}
