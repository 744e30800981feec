use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    admit, already_seen, listed_entry, log_article_failure, partial, read_article, Extraction,
    ExtractionSettings, SourceExtractor,
};
use crate::browser::{BrowserSession, ElementSnapshot};
use crate::error::Result;
use crate::parser::{ArticleRecord, DedupCache};
use crate::sources::{Layout, SourceConfig};

/// Listing page whose entries are clicked through in place, one after the
/// other, returning to the listing between articles.
pub struct ListingExtractor {
    settings: ExtractionSettings,
}

impl ListingExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    /// Open the `index`-th entry and read it. `Ok(None)` means the entry was
    /// already known and nothing was opened.
    async fn visit(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
        listing_url: &str,
        index: usize,
        entry: &ElementSnapshot,
    ) -> Result<Option<ArticleRecord>> {
        let (title, link) = listed_entry(&entry.text, entry.href.as_deref(), listing_url);
        if already_seen(source, cache, &title, link.as_deref()).await {
            return Ok(None);
        }

        session.click(&source.article_locator.nth(index)).await?;
        let candidate = read_article(session, source, &self.settings, &title, link.as_deref()).await?;
        admit(candidate, source, &self.settings, cache).await.map(Some)
    }

    /// Bring the focused tab back to the listing if an article replaced it.
    async fn restore(&self, session: &mut dyn BrowserSession, listing_url: &str) -> Result<()> {
        if session.current_url().await? == listing_url {
            return Ok(());
        }
        session.navigate(listing_url).await?;
        sleep(self.settings.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl SourceExtractor for ListingExtractor {
    fn layout(&self) -> Layout {
        Layout::ListingClickThrough
    }

    async fn extract(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
    ) -> Result<Extraction> {
        let wait = self.settings.wait_timeout;

        session.navigate(&source.url).await?;
        if let Some(ref ready) = source.ready_locator {
            session.wait_for(ready, wait).await?;
        }

        let mut records = Vec::new();
        for page in 0..source.max_pages {
            let listing_url = session.current_url().await?;
            let entries = match session.wait_for_all(&source.article_locator, wait).await {
                Ok(entries) => entries,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(source = %source.name, page, "Listing page did not render: {}", e);
                    break;
                }
            };
            info!(source = %source.name, page, "Found {} listing entries", entries.len());

            for (index, entry) in entries.iter().enumerate() {
                match self.visit(source, session, cache, &listing_url, index, entry).await {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) if e.is_session_fault() => return partial(source, records, e),
                    Err(e) => log_article_failure(source, &e),
                }

                if let Err(e) = self.restore(session, &listing_url).await {
                    if e.is_session_fault() {
                        return partial(source, records, e);
                    }
                    warn!(source = %source.name, "Could not return to listing: {}", e);
                    return Ok(Extraction::complete(records));
                }
            }

            let next_page = page + 1 < source.max_pages;
            match source.nav_locator {
                Some(ref next) if next_page => {
                    if let Err(e) = session.click(next).await {
                        warn!(source = %source.name, page, "No further listing page: {}", e);
                        break;
                    }
                    sleep(self.settings.settle_delay).await;
                }
                _ => break,
            }
        }

        Ok(Extraction::complete(records))
    }
}
