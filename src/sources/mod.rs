//! Source catalog: the fixed set of sites a run visits and the structural
//! locators each one needs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An XPath expression identifying an element within a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(xpath: impl Into<String>) -> Self {
        Self(xpath.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locator for the `index`-th (zero based) match of this locator.
    pub fn nth(&self, index: usize) -> Locator {
        Locator(format!("({})[{}]", self.0, index + 1))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(xpath: &str) -> Self {
        Locator::new(xpath)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    News,
    Social,
    Blog,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::News => "news",
            ContentType::Social => "social",
            ContentType::Blog => "blog",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation shape of a site; selects the extractor used for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Homepage exposing one latest item, read in a separate tab.
    SingleArticle,
    /// Listing page whose entries are clicked through in place.
    ListingClickThrough,
    /// Menu entry leads to a listing whose first entry opens a new tab.
    MenuNavigation,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::SingleArticle => "single_article",
            Layout::ListingClickThrough => "listing_click_through",
            Layout::MenuNavigation => "menu_navigation",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub content_type: ContentType,
    pub layout: Layout,
    #[serde(default = "default_language")]
    pub language: String,
    /// Marker waited for before anything else is located.
    pub ready_locator: Option<Locator>,
    /// Listing entries (or the single latest-article link).
    pub article_locator: Locator,
    /// Title on the article page; the listing entry text is used when absent.
    pub title_locator: Option<Locator>,
    pub body_locator: Locator,
    pub image_locator: Option<Locator>,
    pub date_locator: Option<Locator>,
    /// Menu entry for `MenuNavigation`, next-page control for listings.
    pub nav_locator: Option<Locator>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_pages() -> u32 {
    1
}

/// Immutable list of configured sources, keyed by unique name.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<SourceConfig>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }

    /// The sites this scraper ships with.
    pub fn builtin() -> Self {
        Self::new(vec![
            SourceConfig {
                name: "Global Times".to_string(),
                url: "https://www.globaltimes.cn/".to_string(),
                content_type: ContentType::News,
                layout: Layout::SingleArticle,
                language: "en".to_string(),
                ready_locator: Some(Locator::new(r#"//*[@id="header"]/div/div[2]"#)),
                article_locator: Locator::new(r#"//*[@id="main_section01"]/div/div[2]/div[1]/a"#),
                title_locator: None,
                body_locator: Locator::new(r#"//div[@class="article_content"]"#),
                image_locator: Some(Locator::new(r#"//div[@class="article_content"]//img"#)),
                date_locator: None,
                nav_locator: None,
                max_pages: 1,
            },
            SourceConfig {
                name: "CGTN".to_string(),
                url: "https://www.cgtn.com/sci-tech".to_string(),
                content_type: ContentType::News,
                layout: Layout::ListingClickThrough,
                language: "en".to_string(),
                ready_locator: Some(Locator::new("/html/body/div[1]/div[4]/h2/a")),
                article_locator: Locator::new("/html/body/div[1]/div[5]/div[1]/div/div[1]/div[2]/h3/a"),
                title_locator: None,
                body_locator: Locator::new(r#"//*[@id="cmsMainContent"]"#),
                image_locator: Some(Locator::new(r#"//div[@class="cmsImage"]/img"#)),
                date_locator: None,
                nav_locator: None,
                max_pages: 1,
            },
            SourceConfig {
                name: "CGTN China".to_string(),
                url: "https://www.cgtn.com/china".to_string(),
                content_type: ContentType::News,
                layout: Layout::ListingClickThrough,
                language: "en".to_string(),
                ready_locator: None,
                article_locator: Locator::new("/html/body/div[1]/div[5]/div[1]/div/div[1]/div[2]/h3"),
                title_locator: Some(Locator::new(
                    "/html/body/div[1]/div[4]/div/div/div[2]/div[1]/div[1]/div/h1",
                )),
                body_locator: Locator::new(r#"//*[@id="cmsMainContent"]/div[2]"#),
                image_locator: Some(Locator::new(r#"//div[@class="cmsImage"]/img"#)),
                date_locator: None,
                nav_locator: None,
                max_pages: 1,
            },
        ])
    }

    pub fn get(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl From<Vec<SourceConfig>> for SourceCatalog {
    fn from(sources: Vec<SourceConfig>) -> Self {
        Self::new(sources)
    }
}
