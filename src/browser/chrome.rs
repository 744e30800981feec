use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::session::{BrowserSession, ElementSnapshot, SessionFactory, TabHandle};
use crate::browser::stealth::UserAgentGenerator;
use crate::config::BrowserSettings;
use crate::error::{Result, ScrapeError};
use crate::parser::html::resolve_url;
use crate::sources::Locator;

const LAUNCH_ATTEMPTS: u32 = 3;
const NEW_TAB_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches a fresh hardened Chrome for every session it hands out.
pub struct ChromeSessionFactory {
    settings: BrowserSettings,
    user_agents: UserAgentGenerator,
}

impl ChromeSessionFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            user_agents: UserAgentGenerator::new(),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let user_agent = if self.settings.randomize_user_agent {
            Some(self.user_agents.random_user_agent().to_string())
        } else {
            None
        };
        let session = ChromeSession::launch(self.settings.clone(), user_agent).await?;
        Ok(Box::new(session))
    }
}

/// A chromiumoxide browser with its own transient profile directory. Each
/// page target is one tab.
pub struct ChromeSession {
    id: Uuid,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    tabs: Vec<Page>,
    current: usize,
    profile_dir: PathBuf,
    settings: BrowserSettings,
    user_agent: Option<String>,
}

impl ChromeSession {
    pub async fn launch(settings: BrowserSettings, user_agent: Option<String>) -> Result<Self> {
        let id = Uuid::new_v4();

        // unique profile dir so concurrent sessions never share a singleton lock
        let profile_dir = settings
            .profile_root
            .join(format!("news-scraper-{}-{}", std::process::id(), id));
        std::fs::create_dir_all(&profile_dir).map_err(|e| {
            ScrapeError::SessionFault(format!("Failed to create profile directory {:?}: {}", profile_dir, e))
        })?;

        let browser_config = match Self::browser_config(&settings, &profile_dir) {
            Ok(config) => config,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(e);
            }
        };

        info!("Launching browser session {} (profile {:?})", id, profile_dir);

        let mut last_error = None;
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, mut handler)) => {
                    info!("Browser session {} launched on attempt {}", id, attempt);

                    let handler_task = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                let message = e.to_string();
                                // chrome emits events the protocol crate does not know about
                                if message.contains("data did not match any variant") {
                                    debug!("Ignoring unknown devtools message: {}", message);
                                } else {
                                    warn!("Browser handler error: {}", message);
                                }
                            }
                        }
                        debug!("Browser handler task ended");
                    });

                    let mut session = Self {
                        id,
                        browser: Some(browser),
                        handler_task: Some(handler_task),
                        tabs: Vec::new(),
                        current: 0,
                        profile_dir,
                        settings,
                        user_agent,
                    };

                    if let Err(e) = session.open_initial_tab().await {
                        error!("Browser session {} failed to open its first tab: {}", id, e);
                        let _ = session.close().await;
                        return Err(e);
                    }
                    return Ok(session);
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = Some(e.to_string());
                    if attempt < LAUNCH_ATTEMPTS {
                        sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        let _ = std::fs::remove_dir_all(&profile_dir);
        Err(ScrapeError::SessionFault(format!(
            "Failed to launch browser after {} attempts: {}",
            LAUNCH_ATTEMPTS,
            last_error.unwrap_or_default()
        )))
    }

    fn browser_config(settings: &BrowserSettings, profile_dir: &std::path::Path) -> Result<BrowserConfig> {
        let mut args: Vec<String> = vec![
            format!("--user-data-dir={}", profile_dir.display()),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-software-rasterizer".to_string(),
            "--disable-extensions".to_string(),
            "--disable-default-apps".to_string(),
            "--disable-sync".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--ignore-certificate-errors".to_string(),
            "--no-first-run".to_string(),
            "--mute-audio".to_string(),
            "--log-level=3".to_string(),
        ];
        args.extend(settings.extra_args.iter().cloned());

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(settings.script_timeout)
            .args(args);

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = settings.executable {
            builder = builder.chrome_executable(executable);
        }

        builder
            .build()
            .map_err(|e| ScrapeError::SessionFault(format!("Failed to create browser config: {}", e)))
    }

    async fn open_initial_tab(&mut self) -> Result<()> {
        let page = self.new_page().await?;
        self.tabs.push(page);
        self.current = 0;
        Ok(())
    }

    async fn new_page(&self) -> Result<Page> {
        let browser = self.browser()?;
        let page = match timeout(NEW_TAB_TIMEOUT, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(ScrapeError::SessionFault(format!("Failed to create new page: {}", e))),
            Err(_) => return Err(ScrapeError::SessionFault("Timeout creating new page".to_string())),
        };
        self.prepare_page(&page).await?;
        Ok(page)
    }

    async fn prepare_page(&self, page: &Page) -> Result<()> {
        if let Some(ref user_agent) = self.user_agent {
            let params = SetUserAgentOverrideParams::builder()
                .user_agent(user_agent)
                .build()
                .map_err(|e| ScrapeError::SessionFault(format!("Failed to build user agent params: {}", e)))?;
            page.execute(params).await?;
        }
        Ok(())
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| ScrapeError::SessionFault(format!("Browser session {} is closed", self.id)))
    }

    fn page(&self) -> Result<&Page> {
        self.tabs
            .get(self.current)
            .ok_or_else(|| ScrapeError::SessionFault(format!("Browser session {} has no focused tab", self.id)))
    }

    fn handle_of(page: &Page) -> TabHandle {
        TabHandle(page.target_id().inner().clone())
    }

    /// Poll for matches until at least one renders or the deadline passes.
    async fn locate(&self, locator: &Locator, wait: Duration) -> Result<Vec<Element>> {
        let page = self.page()?;
        let deadline = Instant::now() + wait;

        loop {
            match page.find_xpaths(locator.as_str()).await {
                Ok(elements) if !elements.is_empty() => return Ok(elements),
                Ok(_) => {}
                Err(e) => {
                    let err = ScrapeError::from(e);
                    if err.is_session_fault() {
                        return Err(err);
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(ScrapeError::locator_timeout(locator.as_str(), wait));
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    async fn snapshot(&self, element: &Element) -> Result<ElementSnapshot> {
        let base = self.page()?.url().await?.unwrap_or_default();
        let text = element.inner_text().await?.unwrap_or_default();
        let href = element.attribute("href").await?.map(|href| resolve_url(&base, &href));
        let src = element.attribute("src").await?.map(|src| resolve_url(&base, &src));
        Ok(ElementSnapshot { text, href, src })
    }

    /// Pick up tabs the page opened on its own (target=_blank, window.open).
    async fn refresh_tabs(&mut self) -> Result<()> {
        let pages = self.browser()?.pages().await?;
        for page in pages {
            let handle = Self::handle_of(&page);
            if !self.tabs.iter().any(|known| Self::handle_of(known) == handle) {
                self.prepare_page(&page).await?;
                debug!("Browser session {} adopted tab {}", self.id, handle);
                self.tabs.push(page);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Session {} navigating to {}", self.id, url);
        let page = self.page()?;
        match timeout(self.settings.page_load_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(match ScrapeError::from(e) {
                ScrapeError::Navigation(message) => {
                    ScrapeError::Navigation(format!("Failed to navigate to {}: {}", url, message))
                }
                other => other,
            }),
            Err(_) => Err(ScrapeError::Navigation(format!(
                "Page load for {} timed out after {:?}",
                url, self.settings.page_load_timeout
            ))),
        }
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementSnapshot> {
        let elements = self.locate(locator, timeout).await?;
        self.snapshot(&elements[0]).await
    }

    async fn wait_for_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<ElementSnapshot>> {
        let elements = self.locate(locator, timeout).await?;
        let mut snapshots = Vec::with_capacity(elements.len());
        for element in &elements {
            snapshots.push(self.snapshot(element).await?);
        }
        Ok(snapshots)
    }

    async fn find(&mut self, locator: &Locator) -> Result<Option<ElementSnapshot>> {
        match self.locate(locator, self.settings.implicit_wait).await {
            Ok(elements) => Ok(Some(self.snapshot(&elements[0]).await?)),
            Err(ScrapeError::LocatorTimeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn outer_html(&mut self, locator: &Locator, timeout: Duration) -> Result<String> {
        let elements = self.locate(locator, timeout).await?;
        Ok(elements[0].outer_html().await?.unwrap_or_default())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let elements = self.locate(locator, self.settings.implicit_wait).await?;
        let element = &elements[0];
        if let Err(e) = element.scroll_into_view().await {
            debug!("Could not scroll {} into view: {}", locator, e);
        }
        element.click().await?;
        Ok(())
    }

    async fn open_new_tab(&mut self) -> Result<TabHandle> {
        let page = self.new_page().await?;
        let handle = Self::handle_of(&page);
        self.tabs.push(page);
        debug!("Session {} opened tab {}", self.id, handle);
        Ok(handle)
    }

    async fn switch_tab(&mut self, handle: &TabHandle) -> Result<()> {
        if !self.tabs.iter().any(|page| &Self::handle_of(page) == handle) {
            self.refresh_tabs().await?;
        }
        let index = self
            .tabs
            .iter()
            .position(|page| &Self::handle_of(page) == handle)
            .ok_or_else(|| ScrapeError::Navigation(format!("No such tab: {}", handle)))?;

        self.tabs[index].bring_to_front().await?;
        self.current = index;
        Ok(())
    }

    async fn close_current_tab(&mut self) -> Result<()> {
        if self.tabs.len() <= 1 {
            return Err(ScrapeError::Navigation("Refusing to close the last open tab".to_string()));
        }
        let page = self.tabs.remove(self.current);
        let handle = Self::handle_of(&page);
        self.current = 0;

        page.close().await?;
        debug!("Session {} closed tab {}", self.id, handle);

        if let Some(first) = self.tabs.first() {
            first.bring_to_front().await?;
        }
        Ok(())
    }

    async fn current_tab(&mut self) -> Result<TabHandle> {
        Ok(Self::handle_of(self.page()?))
    }

    async fn tabs(&mut self) -> Result<Vec<TabHandle>> {
        self.refresh_tabs().await?;
        Ok(self.tabs.iter().map(Self::handle_of).collect())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.page()?.url().await?.unwrap_or_default())
    }

    async fn go_back(&mut self) -> Result<()> {
        let page = self.page()?;
        page.evaluate("window.history.back()").await?;
        match timeout(self.settings.page_load_timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ScrapeError::Navigation(format!(
                "History navigation timed out after {:?}",
                self.settings.page_load_timeout
            ))),
        }
    }

    async fn clear_cookies(&mut self) -> Result<()> {
        self.page()?.execute(ClearBrowserCookiesParams::default()).await?;
        debug!("Session {} cleared cookies", self.id);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        for page in self.tabs.drain(..) {
            if let Err(e) = page.close().await {
                debug!("Failed to close tab during shutdown: {}", e);
            }
        }

        if let Err(e) = browser.close().await {
            warn!("Browser session {} did not close cleanly: {}", self.id, e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed waiting for browser session {} to exit: {}", self.id, e);
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!("Could not remove profile directory {:?}: {}", self.profile_dir, e);
        }

        info!("Closed browser session {}", self.id);
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            // dropped without close(), e.g. the run was cancelled; chromiumoxide
            // kills the child process when the Browser is dropped
            warn!("Browser session {} dropped without close, killing it", self.id);
            self.tabs.clear();
            self.browser = None;
            if let Some(task) = self.handler_task.take() {
                task.abort();
            }
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
    }
}
