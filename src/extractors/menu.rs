use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

use super::{
    admit, already_seen, close_tab, listed_entry, log_article_failure, partial, read_article, Extraction,
    ExtractionSettings, SourceExtractor,
};
use crate::browser::{BrowserSession, TabHandle};
use crate::error::{Result, ScrapeError};
use crate::parser::{ArticleRecord, DedupCache};
use crate::sources::{Layout, SourceConfig};

const TAB_POLL: Duration = Duration::from_millis(250);

/// A menu entry leads to a listing whose first article opens in a new tab.
/// Sites that open it in place are handled too.
pub struct MenuExtractor {
    settings: ExtractionSettings,
}

impl MenuExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    /// A tab that was not there before the click. A popup that has not shown
    /// up within the settle delay is assumed not to be coming.
    async fn opened_tab(
        &self,
        session: &mut dyn BrowserSession,
        before: &[TabHandle],
    ) -> Result<Option<TabHandle>> {
        let deadline = Instant::now() + self.settings.settle_delay;
        loop {
            let opened = session
                .tabs()
                .await?
                .into_iter()
                .find(|tab| !before.contains(tab));
            if opened.is_some() || Instant::now() >= deadline {
                return Ok(opened);
            }
            sleep(TAB_POLL).await;
        }
    }

    /// Close a popup that may have opened before the tab lookup failed.
    async fn discard_popup(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        before: &[TabHandle],
        original: &TabHandle,
    ) {
        let tabs = match session.tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                debug!(source = %source.name, "Cannot list tabs to close popup: {}", e);
                return;
            }
        };
        if let Some(tab) = tabs.into_iter().find(|tab| !before.contains(tab)) {
            if let Err(e) = close_tab(session, &tab, original).await {
                error!(source = %source.name, "Failed to close article tab {}: {}", tab, e);
            }
        }
    }

    async fn read(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
        title: &str,
        link: Option<&str>,
    ) -> Result<ArticleRecord> {
        let candidate = read_article(session, source, &self.settings, title, link).await?;
        admit(candidate, source, &self.settings, cache).await
    }
}

#[async_trait]
impl SourceExtractor for MenuExtractor {
    fn layout(&self) -> Layout {
        Layout::MenuNavigation
    }

    async fn extract(
        &self,
        source: &SourceConfig,
        session: &mut dyn BrowserSession,
        cache: &DedupCache,
    ) -> Result<Extraction> {
        let wait = self.settings.wait_timeout;
        let menu = source.nav_locator.as_ref().ok_or_else(|| {
            ScrapeError::Config(format!("Source '{}' has no menu locator", source.name))
        })?;

        session.navigate(&source.url).await?;
        if let Some(ref ready) = source.ready_locator {
            session.wait_for(ready, wait).await?;
        }
        session.wait_for(menu, wait).await?;
        session.click(menu).await?;
        sleep(self.settings.settle_delay).await;

        let entries = session.wait_for_all(&source.article_locator, wait).await?;
        let listing_url = session.current_url().await?;
        let first = entries
            .first()
            .ok_or_else(|| ScrapeError::locator_timeout(source.article_locator.as_str(), wait))?;
        let (title, link) = listed_entry(&first.text, first.href.as_deref(), &listing_url);
        if already_seen(source, cache, &title, link.as_deref()).await {
            return Ok(Extraction::default());
        }

        let original = session.current_tab().await?;
        let before = session.tabs().await?;
        session.click(&source.article_locator.nth(0)).await?;

        let opened = match self.opened_tab(session, &before).await {
            Ok(opened) => opened,
            Err(e) => {
                self.discard_popup(source, session, &before, &original).await;
                return Err(e);
            }
        };

        let (outcome, restored) = match opened {
            Some(tab) => {
                debug!(source = %source.name, "Article opened in tab {}", tab);
                let outcome = match session.switch_tab(&tab).await {
                    Ok(()) => self.read(source, session, cache, &title, link.as_deref()).await,
                    Err(e) => Err(e),
                };
                (outcome, close_tab(session, &tab, &original).await)
            }
            None => {
                debug!(source = %source.name, "Article opened in place");
                let outcome = self.read(source, session, cache, &title, link.as_deref()).await;
                let restored = match session.current_url().await {
                    Ok(url) if url != listing_url => session.navigate(&listing_url).await,
                    Ok(_) => Ok(()),
                    Err(e) => Err(e),
                };
                (outcome, restored)
            }
        };

        if let Err(e) = restored {
            error!(source = %source.name, "Failed to restore menu listing: {}", e);
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
