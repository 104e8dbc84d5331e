//! Stand-in collaborators used by the binary: a plain HTTP downloader and an
//! extractor that treats the locator itself as the only track.

use anyhow::{Context, Result, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::source::{Downloader, Extractor, ProgressReporter};
use crate::model::PlaylistItem;

const REPORT_EVERY_BYTES: usize = 256 * 1024;

#[derive(Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn describe(received: usize, total: Option<u64>) -> String {
    let kib = received / 1024;
    match total {
        Some(total) if total > 0 => {
            format!("Downloading... {kib} KiB ({}%)", received as u64 * 100 / total)
        }
        _ => format!("Downloading... {kib} KiB"),
    }
}

impl Downloader for HttpDownloader {
    fn download<'a>(
        &'a self,
        token: &'a CancellationToken,
        locator: &'a str,
        progress: &'a dyn ProgressReporter,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        async move {
            progress.progress("Connecting...");
            let mut response = self
                .client
                .get(locator)
                .send()
                .await
                .context("request failed")?
                .error_for_status()?;

            let total = response.content_length();
            let mut body = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
            let mut next_report = REPORT_EVERY_BYTES;

            while let Some(chunk) = response.chunk().await.context("body read failed")? {
                if token.is_cancelled() {
                    bail!("download interrupted");
                }
                body.extend_from_slice(&chunk);
                if body.len() >= next_report {
                    progress.progress(&describe(body.len(), total));
                    next_report = body.len() + REPORT_EVERY_BYTES;
                }
            }

            progress.progress(&describe(body.len(), total));
            Ok(body)
        }
        .boxed()
    }
}

/// One item per locator, titled after the last path segment
#[derive(Clone, Copy, Default)]
pub struct DirectExtractor;

fn title_of(locator: &str) -> String {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains("://"))
        .unwrap_or(locator)
        .to_string()
}

impl Extractor for DirectExtractor {
    fn extract<'a>(
        &'a self,
        _token: &'a CancellationToken,
        locator: &'a str,
        progress: &'a dyn ProgressReporter,
    ) -> BoxFuture<'a, Result<Vec<PlaylistItem>>> {
        async move {
            progress.progress("Resolving...");
            Ok(vec![PlaylistItem::new(locator, title_of(locator))])
        }
        .boxed()
    }
}
