use async_trait::async_trait;
use tokio::time::sleep;
use tracing::error;

use super::{
    admit, already_seen, close_tab, listed_entry, log_article_failure, partial, read_article, Extraction,
    ExtractionSettings, SourceExtractor,
};
use crate::browser::{BrowserSession, TabHandle};
use crate::error::{Result, ScrapeError};
use crate::parser::{ArticleRecord, DedupCache};
use crate::sources::{Layout, SourceConfig};

/// Homepage that exposes one latest article; the article is read in a
/// separate tab so the homepage stays loaded.
pub struct SingleArticleExtractor {
    settings: ExtractionSettings,
}

impl SingleArticleExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    async fn read_in_tab(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
        tab: &TabHandle,
        title: &str,
        link: &str,
    ) -> Result<ArticleRecord> {
        session.switch_tab(tab).await?;
        session.navigate(link).await?;
        let candidate = read_article(session, source, &self.settings, title, Some(link)).await?;
        admit(candidate, source, &self.settings, cache).await
    }
}

#[async_trait]
impl SourceExtractor for SingleArticleExtractor {
    fn layout(&self) -> Layout {
        Layout::SingleArticle
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

        let latest = session.wait_for(&source.article_locator, wait).await?;
        let home_url = session.current_url().await?;
        let (title, link) = listed_entry(&latest.text, latest.href.as_deref(), &home_url);
        let Some(link) = link else {
            log_article_failure(source, &ScrapeError::MissingField("link".to_string()));
            return Ok(Extraction::default());
        };
        if already_seen(source, cache, &title, Some(&link)).await {
            return Ok(Extraction::default());
        }

        let original = session.current_tab().await?;
        let tab = session.open_new_tab().await?;
        let outcome = self.read_in_tab(source, session, cache, &tab, &title, &link).await;

        // the article tab is closed on every path
        if let Err(e) = close_tab(session, &tab, &original).await {
            error!(source = %source.name, "Failed to close article tab: {}", e);
            if e.is_session_fault() {
                return partial(source, outcome.into_iter().collect(), e);
            }
        }
        sleep(self.settings.settle_delay).await;

        match outcome {
            Ok(record) => Ok(Extraction::complete(vec![record])),
            Err(e) if e.is_session_fault() => Err(e),
            Err(e) => {
                log_article_failure(source, &e);
                Ok(Extraction::default())
            }
        }
    }
}
