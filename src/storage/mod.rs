use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::error::{Result, ScrapeError};
use crate::parser::ArticleRecord;

/// Receives the merged result of a run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, articles: &[ArticleRecord]) -> Result<()>;
}

/// Discards everything.
pub struct NullSink;

#[async_trait]
impl ResultSink for NullSink {
    async fn deliver(&self, articles: &[ArticleRecord]) -> Result<()> {
        debug!("Discarding {} articles", articles.len());
        Ok(())
    }
}

/// Writes each non-empty result as a pretty-printed JSON array to
/// `<directory>/<prefix>_<YYYYmmdd_HHMMSS>.json`.
pub struct JsonFileSink {
    directory: PathBuf,
    file_prefix: String,
}

impl JsonFileSink {
    pub fn new(directory: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.directory.clone(), config.file_prefix.clone())
    }

    pub fn file_path(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.directory.join(format!(
            "{}_{}.json",
            self.file_prefix,
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }

    fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::Storage(format!("Failed to create directory {:?}: {}", parent, e)))?;
        }
        Ok(())
    }

    /// Write `articles` and return the file, or `None` when there was
    /// nothing to write.
    pub fn write(&self, articles: &[ArticleRecord]) -> Result<Option<PathBuf>> {
        if articles.is_empty() {
            debug!("No articles to save");
            return Ok(None);
        }

        let path = self.file_path(Utc::now());
        self.ensure_directory_exists(&path)?;

        let content = serde_json::to_string_pretty(articles)
            .map_err(|e| ScrapeError::Storage(format!("JSON serialization failed: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| ScrapeError::Storage(format!("Failed to write {:?}: {}", path, e)))?;

        info!("Saved {} articles to {:?}", articles.len(), path);
        Ok(Some(path))
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn deliver(&self, articles: &[ArticleRecord]) -> Result<()> {
        self.write(articles).map(|_| ())
    }
}
