//! Command-line interface definitions for neighborhood_news.
//!
//! Global options select the config file and the store; the subcommand picks
//! the job. Paths and the MongoDB URL can also come from environment
//! variables.

use clap::{Parser, Subcommand};
use neighborhood_news::scrapers::parse_wayback_timestamp;

/// Command-line arguments for the neighborhood_news binary.
///
/// # Examples
///
/// ```sh
/// # Crawl both default sites into ./data/scraped
/// neighborhood_news crawl
///
/// # Crawl only WGBH with a custom config, without writing anything
/// neighborhood_news -c sites.yaml crawl --site wgbh --dry-run
///
/// # Crawl the Globe as archived on 12 April 2019 into MongoDB
/// neighborhood_news --mongo-url mongodb://localhost:27017/ crawl --site globe --wayback 20190412153000
///
/// # Word counts for every collection
/// neighborhood_news word-count
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file; built-in sites are used otherwise
    #[arg(short, long, env = "NEIGHBORHOOD_NEWS_CONFIG", global = true)]
    pub config: Option<String>,

    /// Directory holding the JSON-lines store; ignored when `--mongo-url` is set
    #[arg(short, long, env = "NEIGHBORHOOD_NEWS_STORE_DIR", default_value = "./data", global = true)]
    pub store_dir: String,

    /// MongoDB connection string; the JSON-lines store is used when unset
    #[arg(long, env = "MONGO_URL", global = true)]
    pub mongo_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Index each site's start page, fetch stories and ingest them
    Crawl {
        /// Only crawl these sites (repeatable); all configured sites by default
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Stop after this many story pages per site
        #[arg(long)]
        limit: Option<usize>,

        /// Ingest into an in-memory store instead of the configured store
        #[arg(long)]
        dry_run: bool,

        /// Crawl the Wayback Machine snapshot at this time (YYYYMMDDhhmmss)
        #[arg(long, value_parser = snapshot_timestamp)]
        wayback: Option<String>,
    },

    /// Capture each site's trending bar
    Trending {
        /// Only capture these sites (repeatable)
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Read the trending bar from this Wayback Machine snapshot
        #[arg(long, value_parser = snapshot_timestamp)]
        wayback: Option<String>,
    },

    /// Count story words into `wc_<collection>`
    WordCount {
        /// Collection to count; every collection when omitted
        collection: Option<String>,
    },

    /// Dump a collection to `<output-dir>/<collection>.json`
    Export {
        collection: String,

        /// Output directory for the JSON file
        #[arg(short, long)]
        output_dir: String,
    },
}

fn snapshot_timestamp(raw: &str) -> Result<String, String> {
    parse_wayback_timestamp(raw)
        .map(|_| raw.to_string())
        .ok_or_else(|| format!("`{raw}` is not a YYYYMMDDhhmmss timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_crawl_defaults() {
        let cli = Cli::parse_from(["neighborhood_news", "crawl"]);

        assert_eq!(cli.store_dir, "./data");
        assert_eq!(
            cli.command,
            Command::Crawl {
                sites: vec![],
                limit: None,
                dry_run: false,
                wayback: None,
            }
        );
    }

    #[test]
    fn test_cli_crawl_with_sites_and_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "neighborhood_news",
            "crawl",
            "--site",
            "globe",
            "--site",
            "wgbh",
            "--limit",
            "5",
            "--dry-run",
            "-s",
            "/tmp/store",
            "-c",
            "sites.yaml",
        ]);

        assert_eq!(cli.store_dir, "/tmp/store");
        assert_eq!(cli.config.as_deref(), Some("sites.yaml"));
        assert_eq!(
            cli.command,
            Command::Crawl {
                sites: vec!["globe".to_string(), "wgbh".to_string()],
                limit: Some(5),
                dry_run: true,
                wayback: None,
            }
        );
    }

    #[test]
    fn test_cli_wayback_snapshot() {
        let cli = Cli::parse_from(["neighborhood_news", "crawl", "--wayback", "20190412153000"]);
        assert!(matches!(
            cli.command,
            Command::Crawl { wayback: Some(ref ts), .. } if ts == "20190412153000"
        ));

        let cli = Cli::parse_from(["neighborhood_news", "trending", "--wayback", "20190412153000"]);
        assert_eq!(
            cli.command,
            Command::Trending {
                sites: vec![],
                wayback: Some("20190412153000".to_string()),
            }
        );

        assert!(Cli::try_parse_from(["neighborhood_news", "crawl", "--wayback", "2019-04-12"]).is_err());
    }

    #[test]
    fn test_cli_mongo_url() {
        let cli = Cli::parse_from([
            "neighborhood_news",
            "word-count",
            "--mongo-url",
            "mongodb://localhost:27017/",
        ]);
        assert_eq!(cli.mongo_url.as_deref(), Some("mongodb://localhost:27017/"));
    }

    #[test]
    fn test_cli_word_count_optional_collection() {
        let cli = Cli::parse_from(["neighborhood_news", "word-count"]);
        assert_eq!(cli.command, Command::WordCount { collection: None });

        let cli = Cli::parse_from(["neighborhood_news", "word-count", "globe_stories"]);
        assert_eq!(
            cli.command,
            Command::WordCount {
                collection: Some("globe_stories".to_string())
            }
        );
    }

    #[test]
    fn test_cli_export_requires_output_dir() {
        assert!(Cli::try_parse_from(["neighborhood_news", "export", "back_bay"]).is_err());

        let cli = Cli::parse_from(["neighborhood_news", "export", "back_bay", "-o", "./json"]);
        assert_eq!(
            cli.command,
            Command::Export {
                collection: "back_bay".to_string(),
                output_dir: "./json".to_string(),
            }
        );
    }
}
