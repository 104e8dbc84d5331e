//! Controller module - application logic and event handling
//!
//! Owns the caches, the job coordinator, the player and the playlist, and
//! wires them together. Organized into submodules by responsibility:
//!
//! - `actions`: follow-up action dispatcher fed by finished jobs
//! - `input`: line command parsing and handling
//! - `playback`: playback control methods

mod actions;
mod input;
mod playback;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::audio::{AudioEngine, Player, PlayerControl};
use crate::config::Config;
use crate::error::Error;
use crate::jobs::{Downloader, ItemList, JobCoordinator, JobDeps, ProgressReporter, SourceRegistry};
use crate::model::{BoundedCache, FetchFn, JobClass, ModeTable, Payload, Playlist};

pub use input::Command;

/// External collaborators the controller drives
pub struct Collaborators {
    pub engine: Arc<dyn AudioEngine>,
    pub sources: SourceRegistry,
    pub downloader: Arc<dyn Downloader>,
    /// Progress lines and user-facing error messages
    pub reporter: Arc<dyn ProgressReporter>,
}

#[derive(Clone)]
pub struct AppController {
    pub(crate) config: Arc<Config>,
    pub(crate) playlist: Arc<Playlist>,
    pub(crate) player: Arc<PlayerControl>,
    pub(crate) jobs: Arc<JobCoordinator>,
    pub(crate) items: Arc<BoundedCache<ItemList>>,
    pub(crate) media: Arc<BoundedCache<Payload>>,
    pub(crate) reporter: Arc<dyn ProgressReporter>,
    tasks: TaskTracker,
    stopping: CancellationToken,
}

impl AppController {
    /// Builds the core and starts the action dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config, deps: Collaborators) -> anyhow::Result<Self> {
        let tasks = TaskTracker::new();
        let items = Arc::new(BoundedCache::new(config.cache_capacity));
        let media = Arc::new(BoundedCache::new(config.cache_capacity));
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let jobs = Arc::new(JobCoordinator::new(JobDeps {
            items: items.clone(),
            media: media.clone(),
            sources: deps.sources,
            downloader: deps.downloader,
            actions: actions_tx,
            errors: errors_tx,
            tasks: tasks.clone(),
        })?);

        let player = Arc::new(PlayerControl::new(deps.engine, tasks.clone(), config.volume_step)?);

        let fetch: FetchFn = {
            let jobs = jobs.clone();
            let reporter = deps.reporter.clone();
            Arc::new(move |path: &str| jobs.download.run(path, reporter.clone()))
        };
        let playlist = Arc::new(Playlist::new(
            config.playlist_capacity,
            Arc::new(ModeTable::new()),
            player.clone(),
            fetch,
        ));
        playlist.set_mode(config.default_mode);

        // Weak, so the player does not keep the playlist alive
        let weak = Arc::downgrade(&playlist);
        player.on_end_of_stream(Arc::new(move || {
            if let Some(playlist) = weak.upgrade() {
                playlist.switch();
            }
        }));

        let controller = Self {
            config: Arc::new(config),
            playlist,
            player,
            jobs,
            items,
            media,
            reporter: deps.reporter,
            tasks,
            stopping: CancellationToken::new(),
        };
        controller.start_action_dispatcher(actions_rx, errors_rx);

        tracing::info!(
            cache_capacity = controller.config.cache_capacity,
            playlist_capacity = controller.config.playlist_capacity,
            mode = %controller.config.default_mode,
            "Controller ready"
        );
        Ok(controller)
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn player(&self) -> &PlayerControl {
        &self.player
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancels jobs, drops the live stream and waits for every background
    /// task to unwind.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.jobs.stop_all();
        self.player.clear_stream();
        self.stopping.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!("All tasks finished");
    }

    /// Surfaces an error to the user. Cancellation only reaches the log.
    pub(crate) fn report(&self, error: &Error) {
        if error.is_cancelled() {
            tracing::debug!(error = %error, "Cancelled");
            return;
        }
        // A track that cannot be fetched or loaded ends the pending switch
        if matches!(
            error,
            Error::Transport { class: JobClass::Download, .. } | Error::NotCached(_) | Error::Decode(_)
        ) {
            self.player.end_switch();
        }
        tracing::warn!(error = %error, "Reporting error");
        self.reporter.progress(&Self::format_error(error));
    }

    pub fn format_error(error: &Error) -> String {
        match error {
            Error::Transport { class, source, .. } => {
                let detail = source.to_string();
                if detail.contains("404") {
                    format!("Not found ({class} failed).")
                } else if detail.contains("403") || detail.contains("401") {
                    format!("Access denied ({class} failed).")
                } else if detail.contains("429") {
                    "Rate limited. Please wait a moment.".to_string()
                } else if detail.contains("timed out") {
                    format!("Connection timed out ({class} failed).")
                } else {
                    format!("Error: {error}")
                }
            }
            Error::CapacityExceeded { capacity } => {
                format!("Playlist is full, only the first {capacity} tracks were added.")
            }
            Error::InvalidLocator(locator) => format!("Not a valid address: {locator}"),
            Error::NotCached(_) => "Track data expired, select it again.".to_string(),
            Error::Decode(_) => "Cannot play this track: unsupported data.".to_string(),
            Error::Cancelled { .. } => format!("Error: {error}"),
        }
    }
}
