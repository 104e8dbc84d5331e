//! Follow-up action dispatcher
//!
//! Finished jobs enqueue actions and errors; a single task applies them to
//! the playlist and player in arrival order.

use tokio::sync::mpsc;

use crate::audio::Player;
use crate::error::Error;
use crate::model::{Action, ActionKind, Cache, cache_key};

use super::AppController;

impl AppController {
    pub(crate) fn start_action_dispatcher(
        &self,
        mut actions: mpsc::UnboundedReceiver<Action>,
        mut errors: mpsc::UnboundedReceiver<Error>,
    ) {
        let controller = self.clone();
        let stopping = self.stopping.clone();
        tracing::info!("Starting action dispatcher");

        self.tasks.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stopping.cancelled() => break,
                    Some(action) = actions.recv() => controller.apply(action),
                    Some(error) = errors.recv() => controller.report(&error),
                    else => break,
                }
            }
            tracing::debug!("Action dispatcher stopped");
        });
    }

    pub(crate) fn apply(&self, action: Action) {
        tracing::debug!(kind = ?action.kind, key = %action.payload, "Applying action");
        let result = match action.kind {
            ActionKind::StartPlayback => self.start_playback(&action.payload),
            ActionKind::Play => self.play_cached(&action.payload),
        };
        if let Err(e) = result {
            self.report(&e);
        }
    }

    fn start_playback(&self, key: &str) -> crate::error::Result<()> {
        let Some(items) = self.items.get(key) else {
            return Err(Error::NotCached(key.to_string()));
        };

        // An overflow still leaves the first tracks playable
        let replaced = self.playlist.replace((*items).clone());
        self.playlist.play_current();
        replaced
    }

    fn play_cached(&self, key: &str) -> crate::error::Result<()> {
        let current = self.playlist.current_item().and_then(|item| cache_key(&item.path));
        if current.as_deref() != Some(key) {
            tracing::debug!(key, current = ?current, "Dropping play for a track no longer selected");
            return Ok(());
        }

        let Some(payload) = self.media.get(key) else {
            return Err(Error::NotCached(key.to_string()));
        };
        self.player.load(payload)?;
        tracing::info!(key, "Playing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use tokio_util::sync::CancellationToken;

    use crate::audio::{AudioEngine, AudioStream, SharedDeck};
    use crate::config::Config;
    use crate::controller::Collaborators;
    use crate::jobs::{Downloader, ProgressReporter, SourceRegistry};
    use crate::model::{Payload, PlaybackStatus, PlaylistItem};

    struct Still;

    impl AudioStream for Still {
        fn read(&mut self, _out: &mut [f32]) -> usize {
            0
        }
        fn position(&self) -> Duration {
            Duration::ZERO
        }
        fn duration(&self) -> Duration {
            Duration::from_secs(1)
        }
        fn seek(&mut self, _position: Duration) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NullEngine;

    impl AudioEngine for NullEngine {
        fn decode(&self, _payload: Payload) -> anyhow::Result<Box<dyn AudioStream>> {
            Ok(Box::new(Still))
        }
        fn attach(&self, _deck: SharedDeck) {}
    }

    /// Never finishes, so only seeded caches drive playback
    struct Pending;

    impl Downloader for Pending {
        fn download<'a>(
            &'a self,
            _token: &'a CancellationToken,
            _locator: &'a str,
            _progress: &'a dyn ProgressReporter,
        ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
            futures::future::pending().boxed()
        }
    }

    fn controller() -> (AppController, Arc<Mutex<Vec<String>>>) {
        controller_with(Config { playlist_capacity: 2, ..Config::default() })
    }

    fn controller_with(config: Config) -> (AppController, Arc<Mutex<Vec<String>>>) {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let controller = AppController::new(
            config,
            Collaborators {
                engine: Arc::new(NullEngine),
                sources: SourceRegistry::new(),
                downloader: Arc::new(Pending),
                reporter: Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string())),
            },
        )
        .unwrap();
        (controller, messages)
    }

    fn tracks(n: usize) -> Arc<Vec<PlaylistItem>> {
        Arc::new(
            (0..n)
                .map(|i| PlaylistItem::new(format!("https://cdn.test/{i}.mp3?sig=x"), format!("t{i}")))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_start_playback_replaces_playlist() {
        let (c, messages) = controller();
        c.items.set("https://band.test/a", tracks(2));
        c.apply(Action::start_playback("https://band.test/a"));

        assert_eq!(c.playlist.total(), 2);
        assert_eq!(c.playlist.current_index(), Some(0));
        assert!(messages.lock().unwrap().is_empty());
        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_playback_overflow_keeps_prefix_and_reports() {
        let (c, messages) = controller();
        c.items.set("https://band.test/a", tracks(3));
        c.apply(Action::start_playback("https://band.test/a"));

        assert_eq!(c.playlist.total(), 2);
        assert_eq!(
            messages.lock().unwrap().as_slice(),
            ["Playlist is full, only the first 2 tracks were added."]
        );
        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_play_for_other_track_is_dropped() {
        let (c, messages) = controller();
        c.items.set("https://band.test/a", tracks(2));
        c.apply(Action::start_playback("https://band.test/a"));
        c.media.set("https://cdn.test/1.mp3", vec![1u8; 4].into());

        c.apply(Action::play("https://cdn.test/1.mp3"));
        assert!(!c.player.is_loaded());
        assert!(messages.lock().unwrap().is_empty());

        c.media.set("https://cdn.test/0.mp3", vec![1u8; 4].into());
        c.apply(Action::play("https://cdn.test/0.mp3"));
        assert!(c.player.is_loaded());
        assert_eq!(c.status(), PlaybackStatus::Playing);
        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_play_of_evicted_media_is_reported() {
        let (c, messages) = controller();
        c.items.set("https://band.test/a", tracks(1));
        c.apply(Action::start_playback("https://band.test/a"));

        c.apply(Action::play("https://cdn.test/0.mp3"));
        assert!(!c.player.is_loaded());
        assert_eq!(
            messages.lock().unwrap().as_slice(),
            ["Track data expired, select it again."]
        );
        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_seek_with_extreme_step_saturates() {
        let (c, _) = controller_with(Config { seek_step_secs: i64::MIN, ..Config::default() });
        c.items.set("https://band.test/a", tracks(1));
        c.apply(Action::start_playback("https://band.test/a"));
        c.media.set("https://cdn.test/0.mp3", vec![1u8; 4].into());
        c.apply(Action::play("https://cdn.test/0.mp3"));
        assert!(c.player.is_loaded());

        c.seek_backward();
        c.seek_forward();
        assert_eq!(c.player.progress().map(|(position, _)| position), Some(Duration::ZERO));
        assert_eq!(c.status(), PlaybackStatus::Playing);
        c.shutdown().await;
    }
}
