use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::parser::normalizer::clean_text;
use crate::sources::{ContentType, SourceConfig};

/// One extracted article. Field names are the wire contract of the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub source: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub link: String,
    pub body: String,
    pub content_type: ContentType,
    pub language: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl ArticleRecord {
    pub fn fingerprint(&self) -> &str {
        &self.hash
    }
}

/// Stable content fingerprint of an article: md5 over title, link and source name.
pub fn fingerprint(title: &str, link: &str, source: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}{}", title, link, source)))
}

/// Raw values read from a page, before normalization and validation.
#[derive(Debug, Clone, Default)]
pub struct ArticleCandidate {
    pub title: String,
    /// Text of the listing entry that led to the article. Keys the
    /// fingerprint when present, so a known entry is recognisable before it
    /// is opened even when the displayed title comes from the article page.
    pub listed_title: String,
    pub link: String,
    pub body: String,
    pub image_url: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl ArticleCandidate {
    /// Normalize and validate into a record stamped with the current time.
    /// Does not consult the dedup cache.
    pub fn into_record(self, source: &SourceConfig, min_body_length: usize) -> Result<ArticleRecord> {
        let title = clean_text(&self.title);
        if title.is_empty() {
            return Err(ScrapeError::MissingField("title".to_string()));
        }

        let link = self.link.trim().to_string();
        if link.is_empty() {
            return Err(ScrapeError::MissingField("link".to_string()));
        }

        let body = clean_text(&self.body);
        let length = body.chars().count();
        if length < min_body_length {
            return Err(ScrapeError::ContentTooShort {
                length,
                minimum: min_body_length,
            });
        }

        let listed_title = clean_text(&self.listed_title);
        let key = if listed_title.is_empty() { &title } else { &listed_title };
        let hash = fingerprint(key, &link, &source.name);
        let now = Utc::now();

        Ok(ArticleRecord {
            source: source.name.clone(),
            title,
            date: self.date.unwrap_or(now),
            link,
            body,
            content_type: source.content_type,
            language: source.language.clone(),
            hash,
            timestamp: now,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
        })
    }
}
