pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod extractors;
pub mod orchestrator;
pub mod parser;
pub mod service;
pub mod sources;
pub mod storage;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use orchestrator::Orchestrator;
pub use parser::ArticleRecord;
pub use service::NewsScraper;
