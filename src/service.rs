use std::sync::Arc;
use tracing::{error, info};

use crate::browser::{ChromeSessionFactory, SessionFactory};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::parser::ArticleRecord;
use crate::sources::{SourceCatalog, SourceConfig};
use crate::storage::{JsonFileSink, NullSink, ResultSink};

/// "Scrape all configured sources": one orchestrated run over the catalog,
/// followed by delivery to the configured sink.
pub struct NewsScraper {
    catalog: SourceCatalog,
    orchestrator: Orchestrator,
    sink: Arc<dyn ResultSink>,
}

impl NewsScraper {
    pub fn new(catalog: SourceCatalog, orchestrator: Orchestrator, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            catalog,
            orchestrator,
            sink,
        }
    }

    /// Chrome-backed scraper wired from configuration.
    pub fn from_config(config: &Config) -> Self {
        let factory: Arc<dyn SessionFactory> = Arc::new(ChromeSessionFactory::new(config.browser.clone()));
        let sink: Arc<dyn ResultSink> = if config.output.enabled {
            Arc::new(JsonFileSink::from_config(&config.output))
        } else {
            Arc::new(NullSink)
        };
        Self::new(
            config.catalog(),
            Orchestrator::new(config.scraper.clone(), factory),
            sink,
        )
    }

    pub fn sources(&self) -> &[SourceConfig] {
        self.catalog.sources()
    }

    /// A sink failure is logged; the scraped articles are still returned.
    pub async fn scrape_all(&self) -> Result<Vec<ArticleRecord>> {
        let articles = self.orchestrator.run(self.catalog.sources()).await?;

        match self.sink.deliver(&articles).await {
            Ok(()) => info!("Delivered {} articles", articles.len()),
            Err(e) => error!("Failed to deliver {} articles: {}", articles.len(), e),
        }
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage, FakeSessionFactory, FakeSite};
    use crate::config::{ScraperSettings, SessionPolicy};
    use crate::error::ScrapeError;
    use crate::sources::{ContentType, Layout, Locator};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingSink {
        delivered: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ResultSink for RecordingSink {
        async fn deliver(&self, articles: &[ArticleRecord]) -> Result<()> {
            self.delivered.lock().unwrap().push(articles.len());
            if self.fail {
                return Err(ScrapeError::Storage("disk full".to_string()));
            }
            Ok(())
        }
    }

    fn scraper(sink: Arc<RecordingSink>) -> NewsScraper {
        let site = FakeSite::new()
            .page(
                "https://www.globaltimes.cn/",
                FakePage::new().with("//main//a", FakeElement::link("Port expands", "/page/1.shtml")),
            )
            .page(
                "https://www.globaltimes.cn/page/1.shtml",
                FakePage::new().with(
                    "//div[@class='article_content']",
                    FakeElement::body(&["The eastern port added four new berths to handle growing container traffic."]),
                ),
            );
        let source = SourceConfig {
            name: "Global Times".to_string(),
            url: "https://www.globaltimes.cn/".to_string(),
            content_type: ContentType::News,
            layout: Layout::SingleArticle,
            language: "en".to_string(),
            ready_locator: None,
            article_locator: Locator::new("//main//a"),
            title_locator: None,
            body_locator: Locator::new("//div[@class='article_content']"),
            image_locator: None,
            date_locator: None,
            nav_locator: None,
            max_pages: 1,
        };
        let settings = ScraperSettings {
            base_delay: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            settle_delay: Duration::ZERO,
            session_policy: SessionPolicy::Shared,
            ..ScraperSettings::default()
        };
        let orchestrator = Orchestrator::new(settings, Arc::new(FakeSessionFactory::new(site)));
        NewsScraper::new(SourceCatalog::new(vec![source]), orchestrator, sink)
    }

    #[tokio::test]
    async fn test_scrape_all_delivers_result() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            fail: false,
        });
        let articles = scraper(sink.clone()).scrape_all().await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "https://www.globaltimes.cn/page/1.shtml");
        assert_eq!(*sink.delivered.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        });
        let articles = scraper(sink).scrape_all().await.unwrap();
        assert_eq!(articles.len(), 1);
    }
}
