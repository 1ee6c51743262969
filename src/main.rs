//! # neighborhood_news
//!
//! Crawl the Boston Globe and WGBH local news, tag stories by neighborhood
//! and fan them out into per-neighborhood collections.
//!
//! ## Usage
//!
//! ```sh
//! neighborhood_news --store-dir ./data crawl
//! neighborhood_news --mongo-url mongodb://localhost:27017/ crawl --wayback 20190412153000
//! neighborhood_news trending
//! neighborhood_news word-count globe_stories
//! neighborhood_news export back_bay -o ./json
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a pipeline:
//! 1. **Indexing**: Collect story URLs from each site's start page
//! 2. **Fetching**: Download story pages and extract paragraph fragments
//! 3. **Ingestion**: Dedupe, tag and write each story (parallel, `parallelism` at a time)
//! 4. **Shutdown**: Sync and close the store

use clap::Parser;
use futures::stream::{self, StreamExt};
use neighborhood_news::analysis;
use neighborhood_news::config::{Config, SiteConfig};
use neighborhood_news::models::IngestOutcome;
use neighborhood_news::outputs::json;
use neighborhood_news::pipeline::{IngestPipeline, SiteRegistry};
use neighborhood_news::scrapers::{site, trending};
use neighborhood_news::storage::{DocumentStore, JsonFileStore, MemoryStore, MongoStore};
use reqwest::Client;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("neighborhood_news starting up");

    let args = Cli::parse();
    debug!(
        ?args.config,
        %args.store_dir,
        mongo = args.mongo_url.is_some(),
        command = ?args.command,
        "Parsed CLI arguments"
    );

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            info!("No config file given; using built-in sites");
            Config::default()
        }
    };

    // --- Store lifecycle: opened once here, closed once at the end ---
    let dry_run = matches!(args.command, Command::Crawl { dry_run: true, .. });
    if dry_run {
        let store = MemoryStore::new();
        run(&args.command, &config, &store).await?;
        info!(documents = store.total_documents(), "Dry run finished; nothing persisted");
    } else if let Some(url) = &args.mongo_url {
        let store = MongoStore::open(url, &config.database).await?;
        let result = run(&args.command, &config, &store).await;
        store.close().await;
        result?;
    } else {
        let store = JsonFileStore::open(&args.store_dir, &config.database).await?;
        let result = run(&args.command, &config, &store).await;
        if let Err(e) = store.close().await {
            error!(error = %e, "Failed to close document store");
        }
        result?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn run<S: DocumentStore>(command: &Command, config: &Config, store: &S) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Crawl {
            sites, limit, wayback, ..
        } => {
            let client = http_client()?;
            let registry = config.registry();
            for site in select_sites(config, sites, wayback.as_deref())? {
                let summary = crawl_site(&client, &site, store, &registry, config.parallelism, *limit).await?;
                info!(
                    site = %site.name,
                    indexed = summary.indexed,
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    empty = summary.empty,
                    failed = summary.failed,
                    "Finished crawling site"
                );
            }
        }
        Command::Trending { sites, wayback } => {
            let client = http_client()?;
            for site in select_sites(config, sites, wayback.as_deref())? {
                capture_trending(&client, &site, store).await;
            }
        }
        Command::WordCount { collection: Some(collection) } => {
            let counts = analysis::word_count(store, collection).await?;
            info!(%collection, words = counts.len(), "Word count complete");
        }
        Command::WordCount { collection: None } => {
            let counted = analysis::word_count_all(store).await?;
            info!(collections = ?counted, "Word count complete");
        }
        Command::Export { collection, output_dir } => {
            let (path, count) = json::export_collection(store, collection, output_dir).await?;
            info!(path = %path.display(), count, "Export complete");
        }
    }
    Ok(())
}

fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Resolve `--site` names against the config; all sites when none are given.
///
/// A `--wayback` snapshot overrides whatever snapshot the config pins.
fn select_sites(config: &Config, names: &[String], wayback: Option<&str>) -> Result<Vec<SiteConfig>, Box<dyn Error>> {
    let selected: Vec<&SiteConfig> = if names.is_empty() {
        config.sites.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                config
                    .site(name)
                    .ok_or_else(|| -> Box<dyn Error> { format!("site `{name}` is not configured").into() })
            })
            .collect::<Result<_, _>>()?
    };
    Ok(selected
        .into_iter()
        .map(|site| match wayback {
            Some(timestamp) => site.clone().at_snapshot(timestamp),
            None => site.clone(),
        })
        .collect())
}

#[derive(Debug, Default)]
struct CrawlSummary {
    indexed: usize,
    inserted: usize,
    duplicates: usize,
    empty: usize,
    failed: usize,
}

/// Index one site, then fetch and ingest its stories concurrently.
///
/// A page that fails to fetch or store is logged and counted; the crawl
/// moves on. Pages without any paragraph are not ingested.
#[instrument(level = "info", skip_all, fields(site = %site.name))]
async fn crawl_site<S: DocumentStore>(
    client: &Client,
    site: &SiteConfig,
    store: &S,
    registry: &SiteRegistry,
    parallelism: usize,
    limit: Option<usize>,
) -> Result<CrawlSummary, Box<dyn Error>> {
    let mut urls = site::index_articles(client, site).await?;
    if let Some(limit) = limit {
        urls.truncate(limit);
    }

    let pipeline = IngestPipeline::new(store, registry);
    let mut summary = CrawlSummary {
        indexed: urls.len(),
        ..CrawlSummary::default()
    };

    let outcomes: Vec<PageOutcome> = stream::iter(urls.iter())
        .map(|url| {
            let pipeline = &pipeline;
            async move {
                let extraction = match site::fetch_extraction(client, site, url).await {
                    Ok(extraction) => extraction,
                    Err(e) => {
                        error!(%url, error = %e, "Fetch failed; skipping page");
                        return PageOutcome::Failed;
                    }
                };
                if extraction.fragments.is_empty() {
                    debug!(%url, "No paragraphs on page; not ingesting");
                    return PageOutcome::Empty;
                }
                match pipeline.ingest(&site.name, &extraction).await {
                    Ok(IngestOutcome::Inserted { .. }) => PageOutcome::Inserted,
                    Ok(IngestOutcome::Duplicate) => PageOutcome::Duplicate,
                    Err(e) => {
                        error!(%url, collection = ?e.collection(), error = %e, "Ingest failed");
                        PageOutcome::Failed
                    }
                }
            }
        })
        .buffer_unordered(parallelism)
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            PageOutcome::Inserted => summary.inserted += 1,
            PageOutcome::Duplicate => summary.duplicates += 1,
            PageOutcome::Empty => summary.empty += 1,
            PageOutcome::Failed => summary.failed += 1,
        }
    }
    Ok(summary)
}

enum PageOutcome {
    Inserted,
    Duplicate,
    Empty,
    Failed,
}

/// Store one trending snapshot for `site` if it has any items.
#[instrument(level = "info", skip_all, fields(site = %site.name))]
async fn capture_trending<S: DocumentStore>(client: &Client, site: &SiteConfig, store: &S) {
    let Some(collection) = site.trending_collection.as_deref() else {
        warn!("No trending collection configured; skipping");
        return;
    };

    let snapshot = match trending::fetch_trending(client, site).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            warn!("No trending selector configured; skipping");
            return;
        }
        Err(e) => {
            error!(error = %e, "Trending fetch failed");
            return;
        }
    };
    if snapshot.items.is_empty() {
        info!("Trending bar was empty; nothing stored");
        return;
    }

    let document = match serde_json::to_value(&snapshot) {
        Ok(serde_json::Value::Object(document)) => document,
        Ok(_) => {
            error!("Trending snapshot did not serialize to an object");
            return;
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize trending snapshot");
            return;
        }
    };
    match store.insert(collection, &document).await {
        Ok(()) => info!(%collection, items = snapshot.items.len(), "Stored trending snapshot"),
        Err(e) => error!(error = %e, "Failed to store trending snapshot"),
    }
}
