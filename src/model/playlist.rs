//! Playlist: ordered tracks, a cursor and the active playback mode
//!
//! Reads take the shared lock, mutations the exclusive one. The player and
//! the fetch callback are only invoked after the lock has been released.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::modes::{ModeTable, PlaybackMode, TrackSwitch};
use super::types::{Mode, PlaybackStatus, PlaylistItem};
use crate::audio::Player;
use crate::error::{Error, Result};

/// Starts fetching the media behind a track path. Must return quickly.
pub type FetchFn = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct State {
    items: Vec<PlaylistItem>,
    current: usize,
    mode: Mode,
}

pub struct Playlist {
    state: RwLock<State>,
    capacity: usize,
    modes: Arc<ModeTable>,
    player: Arc<dyn Player>,
    fetch: FetchFn,
}

impl Playlist {
    pub fn new(
        capacity: usize,
        modes: Arc<ModeTable>,
        player: Arc<dyn Player>,
        fetch: FetchFn,
    ) -> Self {
        Self {
            state: RwLock::new(State::default()),
            capacity,
            modes,
            player,
            fetch,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn current_item(&self) -> Option<PlaylistItem> {
        let state = self.read();
        state.items.get(state.current).cloned()
    }

    pub fn current_index(&self) -> Option<usize> {
        let state = self.read();
        (!state.items.is_empty()).then_some(state.current)
    }

    pub fn items(&self) -> Vec<PlaylistItem> {
        self.read().items.clone()
    }

    pub fn mode(&self) -> Mode {
        self.read().mode
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Appends items until the capacity is reached. Items appended before an
    /// overflow stay in the playlist.
    pub fn enqueue(&self, items: Vec<PlaylistItem>) -> Result<()> {
        let mut state = self.write();
        Self::append(&mut state, items, self.capacity)
    }

    fn append(state: &mut State, items: Vec<PlaylistItem>, capacity: usize) -> Result<()> {
        for item in items {
            if state.items.len() >= capacity {
                tracing::warn!(capacity, "Playlist full, dropping remaining items");
                return Err(Error::CapacityExceeded { capacity });
            }
            state.items.push(item);
        }
        Ok(())
    }

    /// Stops playback and installs a new set of items, cursor at the start
    pub fn replace(&self, items: Vec<PlaylistItem>) -> Result<()> {
        self.player.stop();

        let mut state = self.write();
        state.items.clear();
        state.current = 0;
        if items.len() > self.capacity {
            return Self::append(&mut state, items, self.capacity);
        }
        state.items = items;
        tracing::debug!(count = state.items.len(), "Playlist replaced");
        Ok(())
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.items = Vec::with_capacity(self.capacity.min(64));
        state.current = 0;
    }

    pub fn set_mode(&self, mode: Mode) {
        self.write().mode = mode;
        tracing::debug!(%mode, "Playback mode set");
    }

    /// Moves to the next mode in the cycle and returns it
    pub fn next_mode(&self) -> Mode {
        let mode = {
            let mut state = self.write();
            state.mode = state.mode.next();
            state.mode
        };
        tracing::debug!(%mode, "Playback mode cycled");
        mode
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// User "next"
    pub fn next(&self) {
        self.navigate(PlaybackStatus::SkipForward, |mode, current, total| {
            mode.next_track(current, total)
        });
    }

    /// User "previous"
    pub fn prev(&self) {
        self.navigate(PlaybackStatus::SkipBackward, |mode, current, total| {
            mode.prev_track(current, total)
        });
    }

    /// Jumps to `index`. Out-of-range indexes are ignored.
    pub fn select(&self, index: usize) {
        if index >= self.total() {
            tracing::debug!(index, "Selection out of range");
            return;
        }
        self.navigate(PlaybackStatus::SkipForward, |_, current, total| {
            if index < total { index } else { current }
        });
    }

    /// Fetches the current item without moving the cursor
    pub fn play_current(&self) {
        if let Some(item) = self.current_item() {
            self.fetch_path(&item.path);
        }
    }

    /// End-of-stream handler registered with the player
    pub fn switch(&self) {
        if self.is_empty() {
            return;
        }
        // Silence the old track first; play() stays off until the next load
        self.player.stop();
        self.player.set_status(PlaybackStatus::SkipForward);

        // The mode decides under the lock; the player is driven after release
        let decision = {
            let mut state = self.write();
            let total = state.items.len();
            if total == 0 {
                return;
            }
            match self.modes.get(state.mode).switch_track(state.current, total) {
                // Clamped in case the mode and the item count disagree
                TrackSwitch::Advance(index) => {
                    let index = index.min(total - 1);
                    state.current = index;
                    Ok(state.items[index].path.clone())
                }
                other => Err(other),
            }
        };

        match decision {
            Ok(path) => self.fetch_path(&path),
            // Repeat one: rewind the loaded payload instead of fetching it again
            Err(TrackSwitch::Replay) => self.player.reload(),
            Err(_) => {
                // Re-arm the stream so a later play still ends in a switch
                self.player.reload();
                self.player.stop();
                tracing::debug!("Reached end of playlist");
            }
        }
    }

    fn navigate(
        &self,
        status: PlaybackStatus,
        pick: impl FnOnce(&dyn PlaybackMode, usize, usize) -> usize,
    ) {
        if self.is_empty() {
            return;
        }
        self.player.stop();
        self.player.set_status(status);

        let path = {
            let mut state = self.write();
            let total = state.items.len();
            // Emptied between the check above and the lock
            if total == 0 {
                return;
            }
            let index = pick(self.modes.get(state.mode), state.current, total).min(total - 1);
            state.current = index;
            state.items[index].path.clone()
        };

        // Fetching can reach the player, so the lock must be gone by now
        self.fetch_path(&path);
    }

    fn fetch_path(&self, path: &str) {
        if let Err(e) = (self.fetch)(path) {
            tracing::warn!(path, error = %e, "Fetch failed");
            // Nothing will load, so the switch is over; the cursor stays put
            self.player.end_switch();
        }
    }
}
