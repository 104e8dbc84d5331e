//! Playback control on top of an [`AudioEngine`]
//!
//! Every mutation of the live stream (position, pause flag, volume) happens
//! under the deck lock, which the output driver also holds while consuming
//! samples. Decoding, callbacks and task spawning always happen after the
//! lock has been released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;

use super::{AudioEngine, Completion, Deck, EndOfStreamCallback, Player, SharedDeck};
use crate::error::{Error, Result};
use crate::model::{Payload, PlaybackStatus};

/// Persistent status plus an optional one-read overlay
#[derive(Default)]
struct StatusCell {
    current: PlaybackStatus,
    overlay: Option<PlaybackStatus>,
    /// Set by an external skip, cleared once a stream is (re)loaded
    switching: bool,
}

pub struct PlayerControl {
    engine: Arc<dyn AudioEngine>,
    deck: SharedDeck,
    status: Mutex<StatusCell>,
    on_end: Arc<RwLock<Option<EndOfStreamCallback>>>,
    // Bumped on every load/reload/clear so a stale end-of-stream is dropped
    generation: Arc<AtomicU64>,
    volume_step: u8,
    tasks: TaskTracker,
    runtime: Handle,
}

impl PlayerControl {
    /// Must be called from within a Tokio runtime; end-of-stream dispatchers
    /// are spawned onto it and registered with `tasks`.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        tasks: TaskTracker,
        volume_step: u8,
    ) -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("player needs a Tokio runtime")?;
        let deck = Deck::shared();
        engine.attach(deck.clone());

        Ok(Self {
            engine,
            deck,
            status: Mutex::new(StatusCell::default()),
            on_end: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            volume_step,
            tasks,
            runtime,
        })
    }

    /// Position and length of the loaded stream
    pub fn progress(&self) -> Option<(Duration, Duration)> {
        let deck = self.deck();
        deck.stream().map(|s| (s.position(), s.duration()))
    }

    pub fn volume(&self) -> u8 {
        self.deck().volume()
    }

    pub fn is_muted(&self) -> bool {
        self.deck().is_muted()
    }

    pub fn is_loaded(&self) -> bool {
        self.deck().has_stream()
    }

    /// Status without consuming a pending overlay
    pub fn peek_status(&self) -> PlaybackStatus {
        let cell = self.cell();
        cell.overlay.unwrap_or(cell.current)
    }

    fn deck(&self) -> MutexGuard<'_, Deck> {
        self.deck.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cell(&self) -> MutexGuard<'_, StatusCell> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, status: PlaybackStatus) {
        self.cell().current = status;
    }

    /// A new or restarted stream ends any pending track switch
    fn started(&self) {
        let mut cell = self.cell();
        cell.current = PlaybackStatus::Playing;
        cell.switching = false;
    }

    fn set_overlay(&self, status: PlaybackStatus) {
        self.cell().overlay = Some(status);
    }

    fn can_seek(&self) -> bool {
        matches!(
            self.cell().current,
            PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }

    /// Waits for the engine's completion signal on a separate task and then
    /// runs the registered callback, unless the stream has been replaced.
    fn dispatch_end_of_stream(&self, generation: u64, done: oneshot::Receiver<()>) {
        let current = self.generation.clone();
        let on_end = self.on_end.clone();

        self.tasks.spawn_on(
            async move {
                if done.await.is_err() {
                    // Stream replaced or cleared before it finished
                    return;
                }
                if current.load(Ordering::SeqCst) != generation {
                    tracing::debug!(generation, "Ignoring end of a superseded stream");
                    return;
                }
                tracing::debug!(generation, "End of stream");
                let callback = on_end.read().unwrap_or_else(PoisonError::into_inner).clone();
                if let Some(callback) = callback {
                    callback();
                }
            },
            &self.runtime,
        );
    }

    fn seek_within(&self, target: impl FnOnce(Duration, Duration) -> Duration) {
        if !self.can_seek() {
            tracing::debug!("Seek ignored, nothing is playing");
            return;
        }

        let direction = {
            let mut deck = self.deck();
            let Some(stream) = deck.stream_mut() else {
                return;
            };
            let position = stream.position();
            let length = stream.duration();
            let to = target(position, length).min(length);
            if to == position {
                return;
            }
            if let Err(e) = stream.seek(to) {
                tracing::warn!(error = %e, "Seek failed");
                return;
            }
            if to > position {
                PlaybackStatus::SeekForward
            } else {
                PlaybackStatus::SeekBackward
            }
        };

        self.set_overlay(direction);
    }
}

impl Player for PlayerControl {
    fn volume_up(&self) {
        let mut deck = self.deck();
        let volume = deck.volume().saturating_add(self.volume_step);
        deck.set_volume(volume);
    }

    fn volume_down(&self) {
        let mut deck = self.deck();
        let volume = deck.volume().saturating_sub(self.volume_step);
        deck.set_volume(volume);
    }

    fn mute(&self) {
        let muted = self.deck().toggle_mute();
        tracing::debug!(muted, "Mute toggled");
    }

    fn seek(&self, delta_secs: i64) {
        if delta_secs == 0 {
            return;
        }
        let delta = Duration::from_secs(delta_secs.unsigned_abs());
        self.seek_within(|position, _| {
            if delta_secs > 0 {
                position.saturating_add(delta)
            } else {
                position.saturating_sub(delta)
            }
        });
    }

    fn seek_to(&self, position: Duration) {
        self.seek_within(|_, _| position);
    }

    fn load(&self, payload: Payload) -> Result<()> {
        let size = payload.len();
        let stream = self.engine.decode(payload).map_err(Error::Decode)?;
        let (completion, done) = Completion::new();

        let generation = {
            let mut deck = self.deck();
            deck.install(stream, completion);
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.started();
        self.dispatch_end_of_stream(generation, done);
        tracing::info!(bytes = size, "Stream loaded");
        Ok(())
    }

    fn reload(&self) {
        let (completion, done) = Completion::new();

        let generation = {
            let mut deck = self.deck();
            let Some(stream) = deck.stream_mut() else {
                return;
            };
            if let Err(e) = stream.seek(Duration::ZERO) {
                tracing::warn!(error = %e, "Rewind failed on reload");
            }
            deck.rearm(completion);
            deck.set_paused(false);
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.started();
        self.dispatch_end_of_stream(generation, done);
    }

    fn pause(&self) {
        {
            let mut deck = self.deck();
            if !deck.has_stream() {
                return;
            }
            deck.set_paused(true);
        }
        self.set_current(PlaybackStatus::Paused);
    }

    fn play(&self) {
        if self.cell().switching {
            tracing::debug!("Play ignored, track switch in progress");
            return;
        }

        let paused = {
            let mut deck = self.deck();
            if !deck.has_stream() {
                return;
            }
            let paused = !deck.is_paused();
            deck.set_paused(paused);
            paused
        };

        self.set_current(if paused {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        });
    }

    fn stop(&self) {
        {
            let mut deck = self.deck();
            deck.set_paused(true);
            if let Some(stream) = deck.stream_mut() {
                if let Err(e) = stream.seek(Duration::ZERO) {
                    tracing::warn!(error = %e, "Rewind failed on stop");
                }
            }
        }
        self.set_current(PlaybackStatus::Stopped);
    }

    fn clear_stream(&self) {
        {
            let mut deck = self.deck();
            deck.eject();
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        let mut cell = self.cell();
        cell.current = PlaybackStatus::Stopped;
        cell.overlay = None;
        cell.switching = false;
    }

    fn status(&self) -> PlaybackStatus {
        let mut cell = self.cell();
        cell.overlay.take().unwrap_or(cell.current)
    }

    fn set_status(&self, status: PlaybackStatus) {
        if status.is_skip() {
            let mut cell = self.cell();
            cell.overlay = Some(status);
            cell.switching = true;
        } else {
            tracing::debug!(%status, "Rejected external status change");
        }
    }

    fn end_switch(&self) {
        let mut cell = self.cell();
        if cell.switching {
            cell.switching = false;
            tracing::debug!("Track switch abandoned");
        }
    }

    fn on_end_of_stream(&self, callback: EndOfStreamCallback) {
        *self.on_end.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioStream;
    use tokio::sync::mpsc;

    /// Stream of `len` one-second "samples"
    struct FakeStream {
        pos: u64,
        len: u64,
    }

    impl AudioStream for FakeStream {
        fn read(&mut self, out: &mut [f32]) -> usize {
            let n = (self.len - self.pos).min(out.len() as u64);
            self.pos += n;
            n as usize
        }

        fn position(&self) -> Duration {
            Duration::from_secs(self.pos)
        }

        fn duration(&self) -> Duration {
            Duration::from_secs(self.len)
        }

        fn seek(&mut self, position: Duration) -> anyhow::Result<()> {
            self.pos = position.as_secs().min(self.len);
            Ok(())
        }
    }

    /// Engine whose output driver is stepped by the test
    #[derive(Default)]
    struct ManualEngine {
        deck: Mutex<Option<SharedDeck>>,
    }

    impl ManualEngine {
        fn finish(&self) {
            let deck = self.deck.lock().unwrap().clone().unwrap();
            let completion = {
                let mut deck = deck.lock().unwrap();
                if let Some(stream) = deck.stream_mut() {
                    let len = stream.duration();
                    stream.seek(len).unwrap();
                }
                deck.take_completion()
            };
            if let Some(completion) = completion {
                completion.complete();
            }
        }
    }

    impl AudioEngine for ManualEngine {
        fn decode(&self, payload: Payload) -> anyhow::Result<Box<dyn AudioStream>> {
            anyhow::ensure!(!payload.is_empty(), "empty payload");
            Ok(Box::new(FakeStream { pos: 0, len: payload.len() as u64 }))
        }

        fn attach(&self, deck: SharedDeck) {
            *self.deck.lock().unwrap() = Some(deck);
        }
    }

    fn player() -> (Arc<ManualEngine>, PlayerControl, TaskTracker) {
        let engine = Arc::new(ManualEngine::default());
        let tasks = TaskTracker::new();
        let player = PlayerControl::new(engine.clone(), tasks.clone(), 5).unwrap();
        (engine, player, tasks)
    }

    fn payload(len: usize) -> Payload {
        vec![0u8; len].into()
    }

    #[tokio::test]
    async fn test_skip_overlay_is_read_once() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        assert_eq!(player.status(), PlaybackStatus::Playing);

        player.set_status(PlaybackStatus::SkipForward);
        assert_eq!(player.status(), PlaybackStatus::SkipForward);
        assert_eq!(player.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_external_seek_status_rejected() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        player.set_status(PlaybackStatus::SeekForward);
        player.set_status(PlaybackStatus::Paused);
        assert_eq!(player.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_play_toggles_and_ignores_empty_deck() {
        let (_engine, player, _tasks) = player();
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        player.load(payload(60)).unwrap();
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Paused);
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_play_ignored_during_track_switch() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        player.set_status(PlaybackStatus::SkipBackward);
        player.play();
        assert_eq!(player.status(), PlaybackStatus::SkipBackward);
        assert_eq!(player.status(), PlaybackStatus::Playing);

        // Still switching after the overlay has been read
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Playing);

        player.load(payload(30)).unwrap();
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Paused);
    }

    #[tokio::test]
    async fn test_abandoned_switch_releases_play() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        player.stop();
        player.set_status(PlaybackStatus::SkipForward);
        player.play();
        assert_eq!(player.status(), PlaybackStatus::SkipForward);
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        player.end_switch();
        player.play();
        assert_eq!(player.status(), PlaybackStatus::Playing);
        assert!(!player.deck().is_paused());
    }

    #[tokio::test]
    async fn test_stop_rewinds_and_pauses() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        player.seek(30);
        assert_eq!(player.progress().unwrap().0, Duration::from_secs(30));

        player.stop();
        assert_eq!(player.progress().unwrap().0, Duration::ZERO);
        assert_eq!(player.status(), PlaybackStatus::SeekForward);
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        assert!(player.deck().is_paused());
    }

    #[tokio::test]
    async fn test_seek_sets_direction_and_clamps() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();

        player.seek(10);
        assert_eq!(player.status(), PlaybackStatus::SeekForward);
        player.seek(-4);
        assert_eq!(player.status(), PlaybackStatus::SeekBackward);
        assert_eq!(player.progress().unwrap().0, Duration::from_secs(6));

        player.seek(-100);
        assert_eq!(player.progress().unwrap().0, Duration::ZERO);
        player.seek_to(Duration::from_secs(500));
        assert_eq!(player.progress().unwrap().0, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_seek_ignored_when_stopped() {
        let (_engine, player, _tasks) = player();
        player.seek(10);
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        player.load(payload(60)).unwrap();
        player.stop();
        player.seek(10);
        assert_eq!(player.progress().unwrap().0, Duration::ZERO);
        assert_eq!(player.status(), PlaybackStatus::Stopped);
    }

    #[tokio::test]
    async fn test_volume_clamps_and_mute_toggles() {
        let (_engine, player, _tasks) = player();
        for _ in 0..30 {
            player.volume_up();
        }
        assert_eq!(player.volume(), 100);
        for _ in 0..30 {
            player.volume_down();
        }
        assert_eq!(player.volume(), 0);

        player.mute();
        assert!(player.is_muted());
        assert_eq!(player.deck().gain(), 0.0);
        player.mute();
        assert!(!player.is_muted());
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_previous_stream() {
        let (_engine, player, _tasks) = player();
        player.load(payload(60)).unwrap();
        let err = player.load(payload(0)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(player.progress().unwrap().1, Duration::from_secs(60));
    }

    fn counting_callback(player: &PlayerControl) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        player.on_end_of_stream(Arc::new(move || {
            let _ = tx.send(());
        }));
        rx
    }

    async fn next_end(rx: &mut mpsc::UnboundedReceiver<()>) {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("end of stream was not dispatched")
            .unwrap();
    }

    #[tokio::test]
    async fn test_end_of_stream_runs_callback_once() {
        let (engine, player, tasks) = player();
        let mut ends = counting_callback(&player);

        player.load(payload(5)).unwrap();
        engine.finish();
        engine.finish();
        next_end(&mut ends).await;

        tasks.close();
        tasks.wait().await;
        assert!(ends.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reload_rearms_end_of_stream() {
        let (engine, player, _tasks) = player();
        let mut ends = counting_callback(&player);

        player.load(payload(5)).unwrap();
        engine.finish();
        next_end(&mut ends).await;

        player.reload();
        assert_eq!(player.progress().unwrap().0, Duration::ZERO);
        assert_eq!(player.status(), PlaybackStatus::Playing);
        engine.finish();
        next_end(&mut ends).await;
    }

    #[tokio::test]
    async fn test_replaced_stream_never_fires() {
        let (_engine, player, tasks) = player();
        let mut ends = counting_callback(&player);

        player.load(payload(5)).unwrap();
        player.load(payload(7)).unwrap();
        player.clear_stream();

        tasks.close();
        tasks.wait().await;
        assert!(ends.try_recv().is_err());
        assert!(!player.is_loaded());
        assert_eq!(player.status(), PlaybackStatus::Stopped);
    }
}
