//! Scripted in-memory browser for tests. Pages are keyed by URL and expose
//! elements under the exact locator strings the extractors ask for.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::session::{BrowserSession, ElementSnapshot, SessionFactory, TabHandle};
use crate::error::{Result, ScrapeError};
use crate::parser::html::resolve_url;
use crate::sources::Locator;

const BLANK: &str = "about:blank";

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    text: String,
    href: Option<String>,
    src: Option<String>,
    html: String,
    click_target: Option<String>,
    opens_tab: bool,
}

impl FakeElement {
    pub(crate) fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            html: format!("<span>{}</span>", text),
            ..Default::default()
        }
    }

    pub(crate) fn link(text: &str, href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            ..Self::text(text)
        }
    }

    pub(crate) fn image(src: &str) -> Self {
        Self {
            src: Some(src.to_string()),
            html: format!("<img src=\"{}\">", src),
            ..Default::default()
        }
    }

    /// Body container holding one `<p>` per paragraph.
    pub(crate) fn body(paragraphs: &[&str]) -> Self {
        let html = paragraphs
            .iter()
            .map(|p| format!("<p>{}</p>", p))
            .collect::<String>();
        Self {
            text: paragraphs.join("\n"),
            html: format!("<div>{}</div>", html),
            ..Default::default()
        }
    }

    /// Clicking loads `url` without the element advertising an href.
    pub(crate) fn clicks_to(mut self, url: &str) -> Self {
        self.click_target = Some(url.to_string());
        self
    }

    /// Clicking opens the destination in a new tab instead of in place.
    pub(crate) fn in_new_tab(mut self) -> Self {
        self.opens_tab = true;
        self
    }

    fn snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            text: self.text.clone(),
            href: self.href.clone(),
            src: self.src.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, locator: &str, element: FakeElement) -> Self {
        self.elements.entry(locator.to_string()).or_default().push(element);
        self
    }

    fn resolve(&self, locator: &str) -> Vec<&FakeElement> {
        if let Some(found) = self.elements.get(locator) {
            return found.iter().collect();
        }
        // "(base)[n]" picks the n-th match of base
        if let Some((base, index)) = split_indexed(locator) {
            return self
                .elements
                .get(base)
                .and_then(|found| found.get(index))
                .into_iter()
                .collect();
        }
        Vec::new()
    }
}

fn split_indexed(locator: &str) -> Option<(&str, usize)> {
    let rest = locator.strip_prefix('(')?;
    let close = rest.rfind(")[")?;
    let index: usize = rest[close + 2..].strip_suffix(']')?.parse().ok()?;
    Some((&rest[..close], index.checked_sub(1)?))
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSite {
    pages: HashMap<String, FakePage>,
    faulty: HashSet<String>,
    broken: HashSet<String>,
}

impl FakeSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Loading `url` by navigation or click kills the session.
    pub(crate) fn session_fault_at(mut self, url: &str) -> Self {
        self.faulty.insert(url.to_string());
        self
    }

    /// Navigating to `url` fails with a transport error.
    pub(crate) fn unreachable(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }
}

/// Shared, ordered record of what sessions did.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// URLs passed to `navigate`, in call order.
    pub(crate) fn navigations(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("navigate ").map(str::to_string))
            .collect()
    }
}

struct Tab {
    handle: TabHandle,
    history: Vec<String>,
}

pub(crate) struct FakeSession {
    site: Arc<FakeSite>,
    log: EventLog,
    tabs: Vec<Tab>,
    current: usize,
    next_tab: usize,
    closed: bool,
}

impl FakeSession {
    pub(crate) fn new(site: Arc<FakeSite>, log: EventLog) -> Self {
        Self {
            site,
            log,
            tabs: vec![Tab {
                handle: TabHandle("tab-0".to_string()),
                history: vec![BLANK.to_string()],
            }],
            current: 0,
            next_tab: 1,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed || self.tabs.is_empty() {
            return Err(ScrapeError::SessionFault("session is closed".to_string()));
        }
        Ok(())
    }

    fn url(&self) -> &str {
        self.tabs[self.current]
            .history
            .last()
            .map(String::as_str)
            .unwrap_or(BLANK)
    }

    fn lookup(&self, locator: &Locator) -> Result<Vec<FakeElement>> {
        self.ensure_open()?;
        Ok(self
            .site
            .pages
            .get(self.url())
            .map(|page| page.resolve(locator.as_str()).into_iter().cloned().collect())
            .unwrap_or_default())
    }

    fn first(&self, locator: &Locator, timeout: Duration) -> Result<FakeElement> {
        self.lookup(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::locator_timeout(locator.as_str(), timeout))
    }

    fn open_tab(&mut self, url: &str) -> TabHandle {
        let handle = TabHandle(format!("tab-{}", self.next_tab));
        self.next_tab += 1;
        self.tabs.push(Tab {
            handle: handle.clone(),
            history: vec![url.to_string()],
        });
        handle
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.log.push(format!("navigate {}", url));
        // give other tasks a chance to interleave
        tokio::task::yield_now().await;
        if self.site.faulty.contains(url) {
            self.closed = true;
            return Err(ScrapeError::SessionFault(format!("browser crashed loading {}", url)));
        }
        if self.site.broken.contains(url) {
            return Err(ScrapeError::Navigation(format!("net::ERR_CONNECTION_REFUSED at {}", url)));
        }
        self.tabs[self.current].history.push(url.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementSnapshot> {
        Ok(self.first(locator, timeout)?.snapshot())
    }

    async fn wait_for_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<ElementSnapshot>> {
        let found = self.lookup(locator)?;
        if found.is_empty() {
            return Err(ScrapeError::locator_timeout(locator.as_str(), timeout));
        }
        Ok(found.iter().map(FakeElement::snapshot).collect())
    }

    async fn find(&mut self, locator: &Locator) -> Result<Option<ElementSnapshot>> {
        Ok(self.lookup(locator)?.first().map(FakeElement::snapshot))
    }

    async fn outer_html(&mut self, locator: &Locator, timeout: Duration) -> Result<String> {
        Ok(self.first(locator, timeout)?.html)
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let element = self.first(locator, Duration::ZERO)?;
        self.log.push(format!("click {}", locator));
        let Some(target) = element.click_target.or(element.href) else {
            return Ok(());
        };
        let target = resolve_url(self.url(), &target);
        if self.site.faulty.contains(&target) {
            self.closed = true;
            return Err(ScrapeError::SessionFault(format!("browser crashed loading {}", target)));
        }
        if element.opens_tab {
            self.open_tab(&target);
        } else {
            self.tabs[self.current].history.push(target);
        }
        Ok(())
    }

    async fn open_new_tab(&mut self) -> Result<TabHandle> {
        self.ensure_open()?;
        Ok(self.open_tab(BLANK))
    }

    async fn switch_tab(&mut self, handle: &TabHandle) -> Result<()> {
        self.ensure_open()?;
        self.current = self
            .tabs
            .iter()
            .position(|t| &t.handle == handle)
            .ok_or_else(|| ScrapeError::Navigation(format!("no such tab {}", handle)))?;
        Ok(())
    }

    async fn close_current_tab(&mut self) -> Result<()> {
        self.ensure_open()?;
        let tab = self.tabs.remove(self.current);
        self.log.push(format!("close_tab {}", tab.handle));
        self.current = 0;
        Ok(())
    }

    async fn current_tab(&mut self) -> Result<TabHandle> {
        self.ensure_open()?;
        Ok(self.tabs[self.current].handle.clone())
    }

    async fn tabs(&mut self) -> Result<Vec<TabHandle>> {
        self.ensure_open()?;
        Ok(self.tabs.iter().map(|t| t.handle.clone()).collect())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.url().to_string())
    }

    async fn go_back(&mut self) -> Result<()> {
        self.ensure_open()?;
        let history = &mut self.tabs[self.current].history;
        if history.len() > 1 {
            history.pop();
        }
        Ok(())
    }

    async fn clear_cookies(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.log.push("clear_cookies".to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.log.push("close".to_string());
        }
        self.closed = true;
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if !self.closed {
            self.log.push("dropped".to_string());
        }
    }
}

/// Hands out `FakeSession`s over one site and one shared event log.
pub(crate) struct FakeSessionFactory {
    site: Arc<FakeSite>,
    log: EventLog,
    opened: AtomicUsize,
}

impl FakeSessionFactory {
    pub(crate) fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            log: EventLog::default(),
            opened: AtomicUsize::new(0),
        }
    }

    pub(crate) fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn session(&self) -> FakeSession {
        FakeSession::new(self.site.clone(), self.log.clone())
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.log.push("open".to_string());
        Ok(Box::new(self.session()))
    }
}
