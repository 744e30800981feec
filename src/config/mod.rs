use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::sources::{Layout, SourceCatalog, SourceConfig};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

/// How browser sessions are shared between concurrently scraped sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// One session for the whole run; page interaction is serialized.
    Shared,
    /// Every source task gets its own session.
    PerSource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub jitter_min: Duration,
    #[serde(with = "humantime_serde")]
    pub jitter_max: Duration,
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    pub min_body_length: usize,
    /// Pause after every article excursion before touching the page again.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    pub session_policy: SessionPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    #[serde(with = "humantime_serde")]
    pub page_load_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub script_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub implicit_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub randomize_user_agent: bool,
    pub profile_root: PathBuf,
    pub extra_args: Vec<String>,
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_sources() -> Vec<SourceConfig> {
    SourceCatalog::builtin().sources().to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraper: ScraperSettings::default(),
            browser: BrowserSettings::default(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            jitter_min: Duration::from_secs(2),
            jitter_max: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(100),
            min_body_length: 50,
            settle_delay: Duration::from_secs(2),
            session_policy: SessionPolicy::PerSource,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            page_load_timeout: Duration::from_secs(100),
            script_timeout: Duration::from_secs(100),
            implicit_wait: Duration::from_secs(40),
            poll_interval: Duration::from_millis(250),
            randomize_user_agent: true,
            profile_root: std::env::temp_dir(),
            extra_args: Vec::new(),
            executable: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("output"),
            file_prefix: "news".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn catalog(&self) -> SourceCatalog {
        SourceCatalog::new(self.sources.clone())
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScrapeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully ({} sources)", config.sources.len());
        Ok(config)
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ScrapeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // checking sources
        if config.sources.is_empty() {
            return Err(ScrapeError::Config("Source list cannot be empty".to_string()));
        }

        let mut names = HashSet::new();
        for source in &config.sources {
            Self::validate_source(source)?;
            if !names.insert(source.name.as_str()) {
                return Err(ScrapeError::Config(format!("Duplicate source name '{}'", source.name)));
            }
        }

        // checking scraper settings
        let scraper = &config.scraper;
        if scraper.max_attempts == 0 {
            return Err(ScrapeError::Config("max_attempts must be greater than 0".to_string()));
        }
        if scraper.max_attempts > 10 {
            return Err(ScrapeError::Config("max_attempts cannot exceed 10".to_string()));
        }
        if scraper.jitter_min > scraper.jitter_max {
            return Err(ScrapeError::Config("jitter_min must not exceed jitter_max".to_string()));
        }
        if scraper.wait_timeout.is_zero() {
            return Err(ScrapeError::Config("wait_timeout must be greater than 0".to_string()));
        }

        // checking browser settings
        if config.browser.page_load_timeout.is_zero() {
            return Err(ScrapeError::Config("page_load_timeout must be greater than 0".to_string()));
        }
        if config.browser.poll_interval.is_zero() {
            return Err(ScrapeError::Config("poll_interval must be greater than 0".to_string()));
        }

        // checking output and server config
        if config.output.enabled && config.output.file_prefix.trim().is_empty() {
            return Err(ScrapeError::Config("output file_prefix cannot be empty".to_string()));
        }
        if config.server.port < 1024 {
            return Err(ScrapeError::Config("server port must be between 1024 and 65535".to_string()));
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ScrapeError::Config(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ScrapeError::Config(format!("Failed to create config directory: {}", e)))?;
            }
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }

    fn validate_source(source: &SourceConfig) -> Result<()> {
        if source.name.trim().is_empty() {
            return Err(ScrapeError::Config("Source name cannot be empty".to_string()));
        }
        if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
            return Err(ScrapeError::Config(format!(
                "Source '{}' url must start with http:// or https://",
                source.name
            )));
        }
        if source.article_locator.is_empty() || source.body_locator.is_empty() {
            return Err(ScrapeError::Config(format!(
                "Source '{}' needs both an article and a body locator",
                source.name
            )));
        }
        if source.max_pages == 0 {
            return Err(ScrapeError::Config(format!(
                "Source '{}' max_pages must be at least 1",
                source.name
            )));
        }
        if source.layout == Layout::MenuNavigation && source.nav_locator.is_none() {
            return Err(ScrapeError::Config(format!(
                "Source '{}' uses menu navigation but has no nav_locator",
                source.name
            )));
        }
        Ok(())
    }
}
