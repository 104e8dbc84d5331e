//! Playback control methods

use std::time::Duration;

use crate::audio::Player;
use crate::model::{Mode, PlaybackStatus};

use super::AppController;

impl AppController {
    /// Starts extracting `locator`; the playlist is replaced once it finishes
    pub fn open(&self, locator: &str) {
        tracing::info!(locator, "Opening");
        if let Err(e) = self.jobs.extraction.run(locator, self.reporter.clone()) {
            self.report(&e);
        }
    }

    pub fn toggle_playback(&self) {
        tracing::debug!(status = %self.player.peek_status(), "Toggling playback");
        self.player.play();
    }

    pub fn next_track(&self) {
        tracing::debug!("Skipping to next track");
        self.playlist.next();
    }

    pub fn previous_track(&self) {
        tracing::debug!("Skipping to previous track");
        self.playlist.prev();
    }

    pub fn select_track(&self, index: usize) {
        self.playlist.select(index);
    }

    pub fn stop(&self) {
        self.player.stop();
    }

    pub fn seek_forward(&self) {
        self.player.seek(self.config.seek_step_secs);
    }

    pub fn seek_backward(&self) {
        self.player.seek(self.config.seek_step_secs.saturating_neg());
    }

    pub fn seek_to(&self, position: Duration) {
        self.player.seek_to(position);
    }

    pub fn volume_up(&self) {
        self.player.volume_up();
        tracing::debug!(volume = self.player.volume(), "Volume up");
    }

    pub fn volume_down(&self) {
        self.player.volume_down();
        tracing::debug!(volume = self.player.volume(), "Volume down");
    }

    pub fn toggle_mute(&self) {
        self.player.mute();
    }

    pub fn cycle_mode(&self) -> Mode {
        self.playlist.next_mode()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.playlist.set_mode(mode);
    }

    /// Consumes a pending seek/skip overlay, as a UI refresh would
    pub fn status(&self) -> PlaybackStatus {
        self.player.status()
    }

    /// One-line summary of what is playing
    pub fn now_playing(&self) -> String {
        let status = self.player.peek_status();
        let mode = self.playlist.mode();
        let volume = if self.player.is_muted() {
            "muted".to_string()
        } else {
            format!("{}%", self.player.volume())
        };

        let track = match (self.playlist.current_index(), self.playlist.current_item()) {
            (Some(index), Some(item)) => {
                format!("{}/{} {}", index + 1, self.playlist.total(), item.title)
            }
            _ => "nothing queued".to_string(),
        };
        let time = self
            .player
            .progress()
            .map(|(position, length)| {
                format!("  {}/{}", format_time(position), format_time(length))
            })
            .unwrap_or_default();

        format!("[{status}] {track}{time}  vol {volume}  mode {mode}")
    }
}

/// m:ss
pub(crate) fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::ZERO), "0:00");
        assert_eq!(format_time(Duration::from_secs(75)), "1:15");
        assert_eq!(format_time(Duration::from_millis(3_599_900)), "59:59");
    }
}
