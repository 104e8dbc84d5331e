//! Collaborator contracts for page extraction and media download

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::model::{JobClass, PlaylistItem};

/// Receives human-readable progress for a single job
pub trait ProgressReporter: Send + Sync {
    fn progress(&self, message: &str);

    /// The job was superseded or shut down
    fn cancelled(&self, class: JobClass) {
        self.progress(&Error::Cancelled { class }.to_string());
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn progress(&self, message: &str) {
        self(message)
    }
}

/// Reporter that drops everything
pub struct Silent;

impl ProgressReporter for Silent {
    fn progress(&self, _message: &str) {}
}

/// Page locator to playable items
pub trait Extractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        token: &'a CancellationToken,
        locator: &'a str,
        progress: &'a dyn ProgressReporter,
    ) -> BoxFuture<'a, Result<Vec<PlaylistItem>>>;
}

/// Media locator to raw bytes
pub trait Downloader: Send + Sync {
    fn download<'a>(
        &'a self,
        token: &'a CancellationToken,
        locator: &'a str,
        progress: &'a dyn ProgressReporter,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Picks the extractor for a locator by host.
///
/// Built once at startup and handed to the job coordinator.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    routes: Vec<(String, Arc<dyn Extractor>)>,
    fallback: Option<Arc<dyn Extractor>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `host` and all of its subdomains to `extractor`
    pub fn register(mut self, host: &str, extractor: Arc<dyn Extractor>) -> Self {
        self.routes.push((host.trim().to_ascii_lowercase(), extractor));
        self
    }

    /// Used when no host route matches
    pub fn fallback(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.fallback = Some(extractor);
        self
    }

    pub fn resolve(&self, locator: &str) -> Option<Arc<dyn Extractor>> {
        let host = host_of(locator);
        let routed = host.as_deref().and_then(|host| {
            self.routes
                .iter()
                .find(|(route, _)| {
                    host == route
                        || host
                            .strip_suffix(route.as_str())
                            .is_some_and(|prefix| prefix.ends_with('.'))
                })
                .map(|(_, extractor)| extractor.clone())
        });
        routed.or_else(|| self.fallback.clone())
    }
}

fn host_of(locator: &str) -> Option<String> {
    let (_, rest) = locator.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?;
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Named(&'static str);

    impl Extractor for Named {
        fn extract<'a>(
            &'a self,
            _token: &'a CancellationToken,
            _locator: &'a str,
            _progress: &'a dyn ProgressReporter,
        ) -> BoxFuture<'a, Result<Vec<PlaylistItem>>> {
            async move { Ok(vec![PlaylistItem::new("x://y", self.0)]) }.boxed()
        }
    }

    async fn resolved_name(registry: &SourceRegistry, locator: &str) -> Option<String> {
        let extractor = registry.resolve(locator)?;
        let items = extractor
            .extract(&CancellationToken::new(), locator, &Silent)
            .await
            .unwrap();
        Some(items[0].title.clone())
    }

    #[test]
    fn test_host_parsing() {
        assert_eq!(host_of("https://Music.Example.com/album/x?y=1").as_deref(), Some("music.example.com"));
        assert_eq!(host_of("http://user@host:8080/a").as_deref(), Some("host"));
        assert_eq!(host_of("no-scheme/path"), None);
    }

    #[tokio::test]
    async fn test_registry_routes_by_host_suffix() {
        let registry = SourceRegistry::new()
            .register("example.com", Arc::new(Named("example")))
            .register("other.org", Arc::new(Named("other")))
            .fallback(Arc::new(Named("direct")));

        assert_eq!(resolved_name(&registry, "https://band.example.com/track/a").await.as_deref(), Some("example"));
        assert_eq!(resolved_name(&registry, "https://other.org/x").await.as_deref(), Some("other"));
        assert_eq!(resolved_name(&registry, "https://notexample.com/x").await.as_deref(), Some("direct"));
    }

    #[test]
    fn test_registry_without_fallback() {
        let registry = SourceRegistry::new().register("example.com", Arc::new(Named("example")));
        assert!(registry.resolve("https://elsewhere.net/").is_none());
    }

    #[test]
    fn test_closure_reporter_gets_cancel_notice() {
        let seen = std::sync::Mutex::new(Vec::new());
        let reporter = |msg: &str| seen.lock().unwrap().push(msg.to_string());
        reporter.cancelled(JobClass::Download);
        assert_eq!(seen.lock().unwrap().as_slice(), ["download cancelled"]);
    }
}
