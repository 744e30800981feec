use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing::instrument::WithSubscriber;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use news_scraper::api::start_api_server;
use news_scraper::config::{Config, ConfigManager, FileConfigManager};
use news_scraper::parser::ArticleRecord;
use news_scraper::service::NewsScraper;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the TOML configuration file; a default one is written if missing
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape every configured source once and print a summary
    Run,
    /// Serve the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.clone(), startup_subscriber(std::io::stdout)).await?;
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.logging.level))
        .init();

    let scraper = NewsScraper::from_config(&config);
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Scraping {} sources", scraper.sources().len());
            let articles = scraper.scrape_all().await?;
            print_summary(&articles);
        }
        Command::Serve => {
            start_api_server(Arc::new(scraper), &config.server).await?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn log_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Subscriber used while the config file is read, before its log level is known.
fn startup_subscriber<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(log_filter("info"))
        .with_writer(writer)
        .finish()
}

/// Load the config file, reporting loading and default-file creation
/// through `startup`.
async fn load_config(
    path: PathBuf,
    startup: impl Subscriber + Send + Sync + 'static,
) -> news_scraper::Result<Config> {
    FileConfigManager::new(path)
        .load_config()
        .with_subscriber(startup)
        .await
}

fn print_summary(articles: &[ArticleRecord]) {
    let mut by_source: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for article in articles {
        *by_source.entry(article.source.as_str()).or_default() += 1;
        *by_type.entry(article.content_type.as_str()).or_default() += 1;
    }

    println!("Scraped {} articles", articles.len());
    println!("By source:");
    for (source, count) in &by_source {
        println!("  {}: {}", source, count);
    }
    println!("By content type:");
    for (content_type, count) in &by_type {
        println!("  {}: {}", content_type, count);
    }
}
