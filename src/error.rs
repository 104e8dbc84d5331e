//! Error types shared by the playback core

use thiserror::Error;

use crate::model::JobClass;

/// Failures surfaced by jobs, the playlist and the player.
#[derive(Debug, Error)]
pub enum Error {
    /// A job was superseded by a newer one of the same class, or shut down.
    #[error("{class} cancelled")]
    Cancelled { class: JobClass },

    /// Network or decode failure inside a job. Never retried by the core.
    #[error("{class} of {locator} failed: {source}")]
    Transport {
        class: JobClass,
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    /// The playlist cannot hold more items.
    #[error("playlist is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// The locator has no scheme, so it has no cache key.
    #[error("invalid locator: {0:?}")]
    InvalidLocator(String),

    /// A follow-up action referenced a key that is no longer cached.
    #[error("{0} is not cached")]
    NotCached(String),

    /// The audio engine could not turn a payload into a stream.
    #[error("cannot decode stream: {0}")]
    Decode(#[source] anyhow::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
