pub mod article;
pub mod dedup;
pub mod html;
pub mod normalizer;

pub use article::{fingerprint, ArticleCandidate, ArticleRecord};
pub use dedup::DedupCache;
pub use normalizer::{clean_text, parse_date};
