//! Cancellable single-flight jobs
//!
//! Each job class (extraction, download) owns one slot holding the
//! cancellation token of its current job. Starting a job swaps the slot
//! under a mutex and cancels the previous token before the new job is
//! spawned, so at most one live job per class exists at any time.
//!
//! Jobs run on the shared [`TaskTracker`], which is what shutdown waits on.

mod http;
mod source;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Error, Result};
use crate::model::{Action, BoundedCache, Cache, JobClass, Payload, PlaylistItem, cache_key};

pub use http::{DirectExtractor, HttpDownloader};
pub use source::{Downloader, Extractor, ProgressReporter, Silent, SourceRegistry};

/// Extracted items as stored in the cache
pub type ItemList = Arc<Vec<PlaylistItem>>;

/// Everything the jobs need, wired once at startup
pub struct JobDeps {
    pub items: Arc<BoundedCache<ItemList>>,
    pub media: Arc<BoundedCache<Payload>>,
    pub sources: SourceRegistry,
    pub downloader: Arc<dyn Downloader>,
    pub actions: mpsc::UnboundedSender<Action>,
    pub errors: mpsc::UnboundedSender<Error>,
    pub tasks: TaskTracker,
}

struct Shared {
    items: Arc<BoundedCache<ItemList>>,
    media: Arc<BoundedCache<Payload>>,
    sources: SourceRegistry,
    downloader: Arc<dyn Downloader>,
    actions: mpsc::UnboundedSender<Action>,
    errors: mpsc::UnboundedSender<Error>,
    tasks: TaskTracker,
    runtime: Handle,
}

/// One single-flight slot
pub struct JobHandle {
    class: JobClass,
    current: Mutex<Option<CancellationToken>>,
    shared: Arc<Shared>,
}

pub struct JobCoordinator {
    pub extraction: JobHandle,
    pub download: JobHandle,
}

impl JobCoordinator {
    /// Must be called from within a Tokio runtime.
    pub fn new(deps: JobDeps) -> anyhow::Result<Self> {
        let runtime = Handle::try_current()?;
        let shared = Arc::new(Shared {
            items: deps.items,
            media: deps.media,
            sources: deps.sources,
            downloader: deps.downloader,
            actions: deps.actions,
            errors: deps.errors,
            tasks: deps.tasks,
            runtime,
        });

        Ok(Self {
            extraction: JobHandle::new(JobClass::Extraction, shared.clone()),
            download: JobHandle::new(JobClass::Download, shared),
        })
    }

    pub fn handle(&self, class: JobClass) -> &JobHandle {
        match class {
            JobClass::Extraction => &self.extraction,
            JobClass::Download => &self.download,
        }
    }

    /// Cancels every in-flight job
    pub fn stop_all(&self) {
        self.extraction.stop();
        self.download.stop();
    }
}

impl JobHandle {
    fn new(class: JobClass, shared: Arc<Shared>) -> Self {
        Self {
            class,
            current: Mutex::new(None),
            shared,
        }
    }

    pub fn class(&self) -> JobClass {
        self.class
    }

    /// Supersedes the current job of this class and starts a new one.
    ///
    /// Returns immediately. Only a locator without a cache key is rejected
    /// here; such a call leaves the running job alone.
    pub fn run(&self, locator: &str, progress: Arc<dyn ProgressReporter>) -> Result<()> {
        let Some(key) = cache_key(locator) else {
            return Err(Error::InvalidLocator(locator.to_string()));
        };

        let token = CancellationToken::new();
        self.cancel_prev_job(Some(token.clone()));

        let job = Job {
            class: self.class,
            locator: locator.to_string(),
            key,
            token,
            progress,
            shared: self.shared.clone(),
        };
        tracing::debug!(class = %self.class, locator, "Starting job");

        let runtime = &self.shared.runtime;
        match self.class {
            JobClass::Extraction => self.shared.tasks.spawn_on(job.extract(), runtime),
            JobClass::Download => self.shared.tasks.spawn_on(job.download(), runtime),
        };
        Ok(())
    }

    /// Cancels the current job without starting another
    pub fn stop(&self) {
        self.cancel_prev_job(None);
    }

    /// Installs `next` as the current token and cancels the one it replaces.
    /// Both happen under the slot lock.
    fn cancel_prev_job(&self, next: Option<CancellationToken>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *current, next) {
            previous.cancel();
        }
    }
}

/// One launched job instance
struct Job {
    class: JobClass,
    locator: String,
    key: String,
    token: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
    shared: Arc<Shared>,
}

impl Job {
    async fn extract(self) {
        if self.shared.items.get(&self.key).is_some() {
            tracing::debug!(key = %self.key, "Extraction served from cache");
            self.commit(Action::start_playback(&self.key), || {});
            return;
        }

        let Some(extractor) = self.shared.sources.resolve(&self.locator) else {
            self.fail(anyhow::anyhow!("no extractor for this site"));
            return;
        };

        let work = extractor.extract(&self.token, &self.locator, self.progress.as_ref());
        let Some(items) = self.attempt(work).await else {
            return;
        };

        tracing::info!(key = %self.key, count = items.len(), "Extraction finished");
        let items = Arc::new(items);
        self.commit(Action::start_playback(&self.key), || {
            self.shared.items.set(&self.key, items);
        });
    }

    async fn download(self) {
        if self.shared.media.get(&self.key).is_some() {
            tracing::debug!(key = %self.key, "Download served from cache");
            self.commit(Action::play(&self.key), || {});
            return;
        }

        let downloader = self.shared.downloader.clone();
        let work = downloader.download(&self.token, &self.locator, self.progress.as_ref());
        let Some(bytes) = self.attempt(work).await else {
            return;
        };

        tracing::info!(key = %self.key, bytes = bytes.len(), "Download finished");
        let payload: Payload = bytes.into();
        self.commit(Action::play(&self.key), || {
            self.shared.media.set(&self.key, payload);
        });
    }

    /// Runs the collaborator until it finishes or the token fires.
    /// `None` means the job is over (cancelled or failed, already reported).
    async fn attempt<T>(&self, work: impl Future<Output = anyhow::Result<T>>) -> Option<T> {
        // Cancellation is polled first, so it wins when both are ready
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = work => Some(result),
        };

        match outcome {
            Some(Ok(value)) if !self.token.is_cancelled() => Some(value),
            // Failures of a superseded job never reach the error sink
            Some(Err(e)) if !self.token.is_cancelled() => {
                self.fail(e);
                None
            }
            // Cancelled while waiting, or finished after the cancel landed
            _ => {
                self.cancelled();
                None
            }
        }
    }

    /// Writes the result and enqueues the follow-up, checking the token
    /// before each side effect.
    fn commit(&self, action: Action, write: impl FnOnce()) {
        if self.token.is_cancelled() {
            self.cancelled();
            return;
        }
        write();
        if self.token.is_cancelled() {
            self.cancelled();
            return;
        }
        if self.shared.actions.send(action).is_err() {
            tracing::debug!(class = %self.class, "Action queue closed, dropping result");
        }
    }

    fn cancelled(&self) {
        tracing::debug!(class = %self.class, locator = %self.locator, "Job cancelled");
        self.progress.cancelled(self.class);
    }

    fn fail(&self, source: anyhow::Error) {
        tracing::error!(class = %self.class, locator = %self.locator, error = %source, "Job failed");
        let error = Error::Transport {
            class: self.class,
            locator: self.locator.clone(),
            source,
        };
        if self.shared.errors.send(error).is_err() {
            tracing::debug!("Error sink closed");
        }
    }
}
