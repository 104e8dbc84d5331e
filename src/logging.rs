//! File-based logging
//!
//! Tracing output goes to a file rather than stdout, since the terminal
//! belongs to the command loop.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "streamcore";
const DEFAULT_FILTER: &str = "streamcore=debug,warn";

/// Initialize the logging system.
///
/// Logs are written to `<dir>/streamcore.YYYY-MM-DD.log` with daily rotation.
/// The level can be controlled via `RUST_LOG`.
///
/// The returned guard flushes pending lines when dropped; keep it alive for
/// as long as the process logs.
pub fn init_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(dir = %dir.display(), "Logging initialized");

    Ok(guard)
}
