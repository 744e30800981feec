use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::sources::Locator;

/// Identifies one tab (page target) of a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabHandle(pub String);

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What extraction needs to know about a located element, read at the time
/// it was found. `href` and `src` are absolute when the page supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub text: String,
    pub href: Option<String>,
    pub src: Option<String>,
}

/// One live automated browser: its tabs, the focused tab and its cookie jar.
///
/// Every wait is bounded and fails with `ScrapeError::LocatorTimeout`;
/// transport problems surface as `Navigation` and a dead browser as
/// `SessionFault`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementSnapshot>;

    async fn wait_for_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<ElementSnapshot>>;

    /// Single lookup bounded by the session's implicit wait; absence is `Ok(None)`.
    async fn find(&mut self, locator: &Locator) -> Result<Option<ElementSnapshot>>;

    /// Outer HTML of the first match, waiting up to `timeout` for it to render.
    async fn outer_html(&mut self, locator: &Locator, timeout: Duration) -> Result<String>;

    async fn click(&mut self, locator: &Locator) -> Result<()>;

    /// Open a blank tab. Focus stays where it was.
    async fn open_new_tab(&mut self) -> Result<TabHandle>;

    async fn switch_tab(&mut self, handle: &TabHandle) -> Result<()>;

    /// Close the focused tab; focus moves to the first remaining tab.
    async fn close_current_tab(&mut self) -> Result<()>;

    async fn current_tab(&mut self) -> Result<TabHandle>;

    /// All open tabs in opening order, including ones the page opened itself.
    async fn tabs(&mut self) -> Result<Vec<TabHandle>>;

    async fn current_url(&mut self) -> Result<String>;

    async fn go_back(&mut self) -> Result<()>;

    async fn clear_cookies(&mut self) -> Result<()>;

    /// Release the browser process and anything it left on disk.
    async fn close(&mut self) -> Result<()>;
}

/// Allocates sessions. A run asks for one per source or one overall,
/// depending on the configured policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}
