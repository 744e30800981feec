use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::parser::article::ArticleRecord;

/// Fingerprints seen during one run. Grows only; discarded with the run.
#[derive(Debug, Default)]
pub struct DedupCache {
    seen: RwLock<HashSet<String>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, fingerprint: &str) -> bool {
        self.seen.read().await.contains(fingerprint)
    }

    /// Returns `false` when the fingerprint was already present.
    pub async fn insert(&self, fingerprint: impl Into<String>) -> bool {
        self.seen.write().await.insert(fingerprint.into())
    }

    /// Record the article's fingerprint, rejecting it if another extraction
    /// already claimed it. Check and insert happen under one write lock.
    pub async fn admit(&self, record: &ArticleRecord) -> Result<()> {
        if self.insert(record.hash.clone()).await {
            Ok(())
        } else {
            debug!("Duplicate article skipped: {} ({})", record.title, record.hash);
            Err(ScrapeError::DuplicateArticle(record.hash.clone()))
        }
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.read().await.is_empty()
    }
}
