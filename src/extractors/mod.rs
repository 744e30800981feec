//! Per-layout extraction strategies. Each strategy drives a borrowed
//! [`BrowserSession`] through one site's navigation recipe and hands back the
//! articles it could read, leaving the session on its original tab.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod listing;
pub mod menu;
pub mod single;


pub use listing::ListingExtractor;
pub use menu::MenuExtractor;
pub use single::SingleArticleExtractor;

use crate::browser::{BrowserSession, TabHandle};
use crate::config::ScraperSettings;
use crate::error::{Result, ScrapeError};
use crate::parser::html::{body_text, resolve_url};
use crate::parser::{clean_text, fingerprint, parse_date, ArticleCandidate, ArticleRecord, DedupCache};
use crate::sources::{Layout, SourceConfig};

/// The subset of scraper settings extraction depends on.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub wait_timeout: Duration,
    pub min_body_length: usize,
    pub settle_delay: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from(&ScraperSettings::default())
    }
}

impl From<&ScraperSettings> for ExtractionSettings {
    fn from(settings: &ScraperSettings) -> Self {
        Self {
            wait_timeout: settings.wait_timeout,
            min_body_length: settings.min_body_length,
            settle_delay: settings.settle_delay,
        }
    }
}

/// The outcome of one extraction pass.
///
/// `fault` is set when the session died after some articles were already
/// read. The records are still good, but the session must not be reused.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<ArticleRecord>,
    pub fault: Option<ScrapeError>,
}

impl Extraction {
    pub fn complete(records: Vec<ArticleRecord>) -> Self {
        Self { records, fault: None }
    }

    pub fn interrupted(records: Vec<ArticleRecord>, fault: ScrapeError) -> Self {
        Self {
            records,
            fault: Some(fault),
        }
    }
}

#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn layout(&self) -> Layout;

    /// Run one extraction pass over `source`. Article-level faults are logged
    /// and skipped; an error means the whole pass failed.
    async fn extract(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
    ) -> Result<Extraction>;
}

/// Maps each layout to the strategy that knows how to walk it.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<Layout, Arc<dyn SourceExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one extractor per built-in layout.
    pub fn standard(settings: ExtractionSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SingleArticleExtractor::new(settings.clone())));
        registry.register(Arc::new(ListingExtractor::new(settings.clone())));
        registry.register(Arc::new(MenuExtractor::new(settings)));
        registry
    }

    /// Replaces any extractor already registered for the same layout.
    pub fn register(&mut self, extractor: Arc<dyn SourceExtractor>) {
        self.extractors.insert(extractor.layout(), extractor);
    }

    pub fn get(&self, layout: Layout) -> Result<Arc<dyn SourceExtractor>> {
        self.extractors
            .get(&layout)
            .cloned()
            .ok_or_else(|| ScrapeError::UnknownLayout(layout.to_string()))
    }
}

/// Read the article currently displayed in the focused tab.
///
/// The title comes from the page when the source names a title locator,
/// otherwise `listed_title` (the text of the entry that led here) is used.
/// The link falls back to the page URL when the entry carried no href.
pub(crate) async fn read_article(
    session: &mut dyn BrowserSession,
    source: &SourceConfig,
    settings: &ExtractionSettings,
    listed_title: &str,
    listed_link: Option<&str>,
) -> Result<ArticleCandidate> {
    let html = session.outer_html(&source.body_locator, settings.wait_timeout).await?;
    let body = body_text(&html);

    let title = match source.title_locator {
        Some(ref locator) => session.wait_for(locator, settings.wait_timeout).await?.text,
        None => listed_title.to_string(),
    };

    let page_url = session.current_url().await?;
    let link = listed_link.map(str::to_string).unwrap_or_else(|| page_url.clone());

    // image and date are optional: absence is not an error
    let image_url = match source.image_locator {
        Some(ref locator) => session
            .find(locator)
            .await?
            .and_then(|image| image.src)
            .map(|src| resolve_url(&page_url, &src)),
        None => None,
    };
    let date = match source.date_locator {
        Some(ref locator) => session
            .find(locator)
            .await?
            .and_then(|stamp| parse_date(&stamp.text)),
        None => None,
    };

    Ok(ArticleCandidate {
        title,
        listed_title: listed_title.to_string(),
        link,
        body,
        image_url,
        date,
    })
}

/// Validate a candidate and claim its fingerprint in the run cache.
pub(crate) async fn admit(
    candidate: ArticleCandidate,
    source: &SourceConfig,
    settings: &ExtractionSettings,
    cache: &DedupCache,
) -> Result<ArticleRecord> {
    let record = candidate.into_record(source, settings.min_body_length)?;
    cache.admit(&record).await?;
    info!(source = %source.name, fingerprint = %record.hash, "Extracted article: {}", record.title);
    Ok(record)
}

/// True when a listed entry is already known, so it need not be opened at all.
/// Only decidable when both the entry text and its link are on the listing.
pub(crate) async fn already_seen(
    source: &SourceConfig,
    cache: &DedupCache,
    title: &str,
    link: Option<&str>,
) -> bool {
    match link {
        Some(link) if !title.is_empty() => {
            let seen = cache.contains(&fingerprint(title, link, &source.name)).await;
            if seen {
                debug!(source = %source.name, "Skipping known article: {}", title);
            }
            seen
        }
        _ => false,
    }
}

/// Clean the text of a listing entry and resolve its href against the listing.
pub(crate) fn listed_entry(text: &str, href: Option<&str>, listing_url: &str) -> (String, Option<String>) {
    let title = clean_text(text);
    let link = href
        .filter(|href| !href.trim().is_empty())
        .map(|href| resolve_url(listing_url, href));
    (title, link)
}

/// Close `tab` and put focus back on `original`.
pub(crate) async fn close_tab(
    session: &mut dyn BrowserSession,
    tab: &TabHandle,
    original: &TabHandle,
) -> Result<()> {
    session.switch_tab(tab).await?;
    session.close_current_tab().await?;
    session.switch_tab(original).await
}

pub(crate) fn log_article_failure(source: &SourceConfig, err: &ScrapeError) {
    match err {
        ScrapeError::DuplicateArticle(_) => {}
        ScrapeError::MissingField(_) | ScrapeError::ContentTooShort { .. } => {
            warn!(source = %source.name, "Skipping article: {}", err)
        }
        _ => warn!(source = %source.name, "Failed to extract article: {}", err),
    }
}

/// What a pass ends with when the session died part way: whatever was
/// already collected along with the fault, or the fault itself if nothing was.
pub(crate) fn partial(source: &SourceConfig, records: Vec<ArticleRecord>, err: ScrapeError) -> Result<Extraction> {
    if records.is_empty() {
        Err(err)
    } else {
        warn!(
            source = %source.name,
            "Session failed after {} articles, keeping them: {}",
            records.len(),
            err
        );
        Ok(Extraction::interrupted(records, err))
    }
}
