//! Fan-out/fan-in over the configured sources with a bounded, jittered retry
//! loop per source.
//!
//! Source tasks are polled concurrently inside the calling task rather than
//! spawned, so none of them outlives [`Orchestrator::run`]. Dropping the run
//! future drops every session with it, and a dropped Chrome session kills
//! its browser.

use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserSession, SessionFactory};
use crate::config::{ScraperSettings, SessionPolicy};
use crate::error::{RecoveryStrategy, Result, ScrapeError};
use crate::extractors::{Extraction, ExtractorRegistry, SourceExtractor};
use crate::parser::{ArticleRecord, DedupCache};
use crate::sources::SourceConfig;


/// A session that may not be open yet. Under the shared policy every source
/// holds the same slot and the lock serializes their attempts.
type SessionSlot = Arc<Mutex<Option<Box<dyn BrowserSession>>>>;

pub struct Orchestrator {
    settings: ScraperSettings,
    factory: Arc<dyn SessionFactory>,
    registry: ExtractorRegistry,
}

impl Orchestrator {
    pub fn new(settings: ScraperSettings, factory: Arc<dyn SessionFactory>) -> Self {
        let registry = ExtractorRegistry::standard((&settings).into());
        Self {
            settings,
            factory,
            registry,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    /// Scrape every source with a fresh dedup cache.
    pub async fn run(&self, sources: &[SourceConfig]) -> Result<Vec<ArticleRecord>> {
        self.run_with_cache(sources, &DedupCache::new()).await
    }

    /// Scrape every source, deduplicating against `cache`.
    ///
    /// Only failing to open the shared session is an error; sources that
    /// never succeed simply contribute nothing.
    pub async fn run_with_cache(
        &self,
        sources: &[SourceConfig],
        cache: &DedupCache,
    ) -> Result<Vec<ArticleRecord>> {
        let started = Instant::now();
        info!(
            "Starting scrape run over {} sources ({:?} sessions)",
            sources.len(),
            self.settings.session_policy
        );

        let shared: Option<SessionSlot> = match self.settings.session_policy {
            SessionPolicy::Shared => {
                let session = self.factory.open().await.map_err(|e| {
                    error!("Failed to open shared browser session: {}", e);
                    e
                })?;
                Some(Arc::new(Mutex::new(Some(session))))
            }
            SessionPolicy::PerSource => None,
        };

        let mut tasks: FuturesUnordered<_> = sources
            .iter()
            .map(|source| {
                let (slot, owned) = match shared {
                    Some(ref slot) => (slot.clone(), false),
                    None => (Arc::new(Mutex::new(None)), true),
                };
                async move {
                    let records = self.scrape_source(source, &slot, cache).await;
                    if owned {
                        close_slot(&slot).await;
                    }
                    records
                }
            })
            .collect();

        // merge in completion order
        let mut articles = Vec::new();
        while let Some(records) = tasks.next().await {
            articles.extend(records);
        }

        if let Some(ref slot) = shared {
            close_slot(slot).await;
        }

        info!(
            "Scrape run finished: {} articles from {} sources in {:?}",
            articles.len(),
            sources.len(),
            started.elapsed()
        );
        Ok(articles)
    }

    /// The per-source retry loop. Never fails; exhaustion yields no records.
    async fn scrape_source(
        &self,
        source: &SourceConfig,
        slot: &SessionSlot,
        cache: &DedupCache,
    ) -> Vec<ArticleRecord> {
        let extractor = match self.registry.get(source.layout) {
            Ok(extractor) => extractor,
            Err(e) => {
                error!(source = %source.name, "Cannot scrape source: {}", e);
                return Vec::new();
            }
        };

        let max_attempts = self.settings.max_attempts;
        let mut attempts = 0;
        for attempt in 0..max_attempts {
            let jitter = self.jitter();
            debug!(source = %source.name, "Waiting {:?} before attempt", jitter);
            sleep(jitter).await;

            attempts = attempt + 1;
            info!(
                source = %source.name,
                attempt = attempts,
                max_attempts,
                "Starting extraction attempt"
            );
            match self.attempt(source, extractor.as_ref(), slot, cache).await {
                Ok(Extraction { records, fault }) => {
                    if let Some(e) = fault {
                        warn!(source = %source.name, attempt = attempts, "Session lost during attempt: {}", e);
                    }
                    if !records.is_empty() {
                        info!(
                            source = %source.name,
                            attempt = attempts,
                            "Extracted {} articles",
                            records.len()
                        );
                        return records;
                    }
                    warn!(source = %source.name, attempt = attempts, "Attempt yielded no articles");
                }
                Err(e) => {
                    error!(source = %source.name, attempt = attempts, "Attempt failed: {}", e);
                    if e.recovery_strategy() == RecoveryStrategy::Abort {
                        break;
                    }
                }
            }

            if attempts < max_attempts {
                let delay = self.backoff(attempt);
                info!(source = %source.name, "Backing off for {:?}", delay);
                sleep(delay).await;
            }
        }

        error!(source = %source.name, "Giving up after {} of {} attempts", attempts, max_attempts);
        Vec::new()
    }

    /// One attempt with exclusive use of the session for its whole duration.
    /// A session that died during the attempt is discarded before the lock is
    /// released, so nobody else gets to use it.
    async fn attempt(
        &self,
        source: &SourceConfig,
        extractor: &dyn SourceExtractor,
        slot: &SessionSlot,
        cache: &DedupCache,
    ) -> Result<Extraction> {
        let mut guard = slot.lock().await;
        if guard.is_none() {
            debug!(source = %source.name, "Opening browser session");
            *guard = Some(self.factory.open().await?);
        }
        let session = guard
            .as_mut()
            .ok_or_else(|| ScrapeError::SessionFault("no browser session".to_string()))?;

        let outcome = match session.clear_cookies().await {
            Ok(()) => extractor.extract(source, session.as_mut(), cache).await,
            Err(e) => Err(e),
        };
        let faulted = match outcome {
            Ok(ref extraction) => extraction.fault.is_some(),
            Err(ref e) => e.recovery_strategy() == RecoveryStrategy::RestartSession,
        };
        if faulted {
            discard_session(&mut guard).await;
        }
        outcome
    }

    /// Wait after the failed zero-based `attempt`: twice the base delay after
    /// the first failure, three times after the second, and so on.
    fn backoff(&self, attempt: u32) -> Duration {
        self.settings.base_delay * (attempt + 2)
    }

    fn jitter(&self) -> Duration {
        let (min, max) = (self.settings.jitter_min, self.settings.jitter_max);
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }
}

/// Close and forget a faulted session so the next attempt opens a new one.
async fn discard_session(session: &mut Option<Box<dyn BrowserSession>>) {
    if let Some(mut session) = session.take() {
        warn!("Restarting browser session");
        if let Err(e) = session.close().await {
            debug!("Closing faulted session failed: {}", e);
        }
    }
}

async fn close_slot(slot: &SessionSlot) {
    if let Some(mut session) = slot.lock().await.take() {
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
    }
}
