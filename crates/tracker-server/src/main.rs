//! Model Tracker - REST API and daily crawl jobs.
//!
//! `serve` exposes the read queries over HTTP; `crawl` runs one ingestion
//! source (or all of them) against the same SQLite database and exits
//! non-zero when the record error rate breaches the alert threshold.

mod error;
mod handlers;
mod server;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tracker_core::config::{AppConfig, IngestConfig};
use tracker_core::{
    ArenaCrawler, ArxivCrawler, Crawler, HttpClient, HubCrawler, IngestReport, QueryEngine,
    SnapshotStore,
};

#[derive(Parser, Debug)]
#[command(name = "model-tracker")]
#[command(about = "Daily tracker for AI models, papers and leaderboard standings")]
struct Args {
    /// SQLite database file
    #[arg(long, global = true, env = AppConfig::DB_PATH_ENV, default_value = AppConfig::DEFAULT_DB_FILENAME)]
    db: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on (0 = auto-assign)
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Run one ingestion pass
    Crawl {
        #[arg(value_enum)]
        source: CrawlSource,
    },

    /// Print row counts per table
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CrawlSource {
    Hf,
    Arxiv,
    Arena,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the level chosen by --debug
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let store = SnapshotStore::open(&args.db)
        .with_context(|| format!("opening database {}", args.db.display()))?;
    info!("Database: {}", args.db.display());

    match args.command {
        Command::Serve { host, port } => serve(store, &host, port).await,
        Command::Crawl { source } => crawl(store, source).await,
        Command::Stats => stats(&store),
    }
}

async fn serve(store: SnapshotStore, host: &str, port: u16) -> Result<()> {
    info!("Starting {}", AppConfig::APP_NAME);

    let state = server::AppState::new(QueryEngine::new(store));
    let addr = server::start_server(state, host, port).await?;
    info!("REST API running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    Ok(())
}

fn build_crawlers(source: CrawlSource, client: Arc<HttpClient>) -> Vec<Box<dyn Crawler>> {
    let hub = || Box::new(HubCrawler::new(client.clone())) as Box<dyn Crawler>;
    let arxiv = || Box::new(ArxivCrawler::new(client.clone())) as Box<dyn Crawler>;
    let arena = || Box::new(ArenaCrawler::new(client.clone())) as Box<dyn Crawler>;

    match source {
        CrawlSource::Hf => vec![hub()],
        CrawlSource::Arxiv => vec![arxiv()],
        CrawlSource::Arena => vec![arena()],
        CrawlSource::All => vec![hub(), arxiv(), arena()],
    }
}

async fn crawl(store: SnapshotStore, source: CrawlSource) -> Result<()> {
    let token = std::env::var(AppConfig::HF_TOKEN_ENV).ok();
    let client = Arc::new(HttpClient::new()?.with_bearer_token(token));
    let today = Utc::now().date_naive();

    let mut reports: Vec<IngestReport> = Vec::new();
    for crawler in build_crawlers(source, client) {
        info!("Crawling {} for {}", crawler.source(), today);
        match crawler.crawl(&store, today).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Crawl of {} failed: {}", crawler.source(), e);
                anyhow::bail!("crawl of {} failed: {}", crawler.source(), e);
            }
        }
    }

    let failed: Vec<&IngestReport> = reports.iter().filter(|r| r.exceeds_threshold()).collect();
    if !failed.is_empty() {
        for report in &failed {
            error!(
                "Error rate {:.1}% for {} exceeded threshold {:.1}%",
                report.error_rate() * 100.0,
                report.source,
                IngestConfig::ERROR_RATE_THRESHOLD * 100.0
            );
        }
        anyhow::bail!("{} crawl(s) exceeded the error rate threshold", failed.len());
    }

    Ok(())
}

fn stats(store: &SnapshotStore) -> Result<()> {
    let counts = store.counts()?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
