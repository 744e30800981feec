use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("Locator timeout: '{locator}' did not render within {timeout:?}")]
    LocatorTimeout { locator: String, timeout: Duration },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Content too short: {length} characters (minimum {minimum})")]
    ContentTooShort { length: usize, minimum: usize },

    #[error("Duplicate article: {0}")]
    DuplicateArticle(String),

    #[error("Session fault: {0}")]
    SessionFault(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No extractor registered for layout: {0}")]
    UnknownLayout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Discard the current article and move on to the next one.
    SkipArticle,
    /// Fail the attempt and let the source retry loop back off.
    RetryWithBackoff,
    /// Fail the attempt and replace the browser session before retrying.
    RestartSession,
    /// Not recoverable inside a run.
    Abort,
}

impl ScrapeError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ScrapeError::MissingField(_)
            | ScrapeError::ContentTooShort { .. }
            | ScrapeError::DuplicateArticle(_) => RecoveryStrategy::SkipArticle,
            ScrapeError::LocatorTimeout { .. } | ScrapeError::Navigation(_) => {
                RecoveryStrategy::RetryWithBackoff
            }
            ScrapeError::SessionFault(_) => RecoveryStrategy::RestartSession,
            ScrapeError::Config(_) | ScrapeError::Storage(_) | ScrapeError::UnknownLayout(_) => {
                RecoveryStrategy::Abort
            }
        }
    }

    /// Faults that only disqualify a single article.
    pub fn is_article_level(&self) -> bool {
        self.recovery_strategy() == RecoveryStrategy::SkipArticle
    }

    pub fn is_session_fault(&self) -> bool {
        matches!(self, ScrapeError::SessionFault(_))
    }

    pub fn locator_timeout(locator: impl Into<String>, timeout: Duration) -> Self {
        ScrapeError::LocatorTimeout {
            locator: locator.into(),
            timeout,
        }
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapeError {
    fn from(err: toml::de::Error) -> Self {
        ScrapeError::Config(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            // the devtools connection itself is gone
            CdpError::Ws(_) | CdpError::NoResponse => ScrapeError::SessionFault(err.to_string()),
            other => ScrapeError::Navigation(other.to_string()),
        }
    }
}
