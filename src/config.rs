//! Crawl configuration loaded from YAML.
//!
//! Every crawl target names its primary collection explicitly; there is no
//! fallback derived from the site name. When no file is given the built-in
//! defaults for the Boston Globe and WGBH are used.
//!
//! ```yaml
//! database: scraped
//! parallelism: 8
//! sites:
//!   - name: globe
//!     start_url: https://www.bostonglobe.com/metro
//!     allowed_domains: [bostonglobe.com]
//!     link_selector: 'div[class="story"] a[href]'
//!     paragraph_selector: 'div[class="article-text"] > p'
//!     collection: globe_stories
//!     # Crawl the Internet Archive copy instead of the live site.
//!     wayback: "20190412153000"
//! ```

use crate::pipeline::SiteRegistry;
use crate::scrapers::{parse_wayback_timestamp, wayback_url};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One crawl target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Short name used on the command line and in logs.
    pub name: String,
    /// Page whose story links get indexed.
    pub start_url: String,
    /// Hosts (and their subdomains) story links may point at.
    pub allowed_domains: Vec<String>,
    /// Selector for story links on the start page.
    pub link_selector: String,
    /// Selector for paragraph nodes on a story page.
    pub paragraph_selector: String,
    /// Page carrying the trending bar; defaults to `start_url`.
    #[serde(default)]
    pub trending_url: Option<String>,
    /// Selector for trending-bar links.
    #[serde(default)]
    pub trending_selector: Option<String>,
    /// Primary collection for this site's stories.
    pub collection: String,
    /// Collection for trending snapshots.
    #[serde(default)]
    pub trending_collection: Option<String>,
    /// Snapshot time (`YYYYMMDDhhmmss`) to crawl from the Wayback Machine
    /// instead of the live site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wayback: Option<String>,
}

impl SiteConfig {
    /// Start page to index, routed through the Wayback Machine when a
    /// snapshot is set.
    pub fn entry_url(&self) -> String {
        self.fetch_url(&self.start_url)
    }

    /// Page carrying the trending bar, routed like [`Self::entry_url`].
    pub fn trending_page_url(&self) -> String {
        self.fetch_url(self.trending_url.as_deref().unwrap_or(&self.start_url))
    }

    /// This site pinned to the snapshot at `timestamp`.
    pub fn at_snapshot(self, timestamp: impl Into<String>) -> Self {
        Self {
            wayback: Some(timestamp.into()),
            ..self
        }
    }

    fn fetch_url(&self, url: &str) -> String {
        match &self.wayback {
            Some(timestamp) => wayback_url(timestamp, url),
            None => url.to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Database (directory) name under the store directory.
    #[serde(default = "default_database")]
    pub database: String,
    /// How many story pages are fetched and ingested at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    pub sites: Vec<SiteConfig>,
}

fn default_database() -> String {
    "scraped".to_string()
}

fn default_parallelism() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        const TRENDING: &str =
            r#"div#trending_bar_items > a[class="trending_bar_item | color_black float_left"]"#;
        Self {
            database: default_database(),
            parallelism: default_parallelism(),
            sites: vec![
                SiteConfig {
                    name: "globe".to_string(),
                    start_url: "https://www.bostonglobe.com/metro".to_string(),
                    allowed_domains: vec!["bostonglobe.com".to_string()],
                    link_selector: r#"div[class="story"] a[href]"#.to_string(),
                    paragraph_selector: r#"div[class="article-text"] > p"#.to_string(),
                    trending_url: Some("https://www.bostonglobe.com".to_string()),
                    trending_selector: Some(TRENDING.to_string()),
                    collection: "globe_stories".to_string(),
                    trending_collection: Some("globe_trending".to_string()),
                    wayback: None,
                },
                SiteConfig {
                    name: "wgbh".to_string(),
                    start_url: "https://www.wgbh.org/news/local-news".to_string(),
                    allowed_domains: vec!["wgbh.org".to_string()],
                    link_selector: r#"ul[class="FourUp-Items-Item"] a[href]"#.to_string(),
                    paragraph_selector: r#"div[class="RichTextArticleBody-body"] > p"#.to_string(),
                    trending_url: None,
                    trending_selector: Some(TRENDING.to_string()),
                    collection: "wgbh_stories".to_string(),
                    trending_collection: Some("wgbh_trending".to_string()),
                    wayback: None,
                },
            ],
        }
    }
}

impl Config {
    /// Read and validate a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&body)?;
        info!(sites = config.sites.len(), database = %config.database, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(body: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(body)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the crawler could not act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database name is empty".to_string()));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::Invalid("parallelism must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.name.as_str()) {
                return Err(ConfigError::Invalid(format!("site `{}` is listed twice", site.name)));
            }
            if site.collection.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("site `{}` has no collection", site.name)));
            }
            if let Some(timestamp) = &site.wayback {
                if parse_wayback_timestamp(timestamp).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "site `{}` wayback {timestamp:?} is not a YYYYMMDDhhmmss timestamp",
                        site.name
                    )));
                }
            }
            for url in [Some(site.start_url.as_str()), site.trending_url.as_deref()].into_iter().flatten() {
                Url::parse(url)
                    .map_err(|e| ConfigError::Invalid(format!("site `{}` url {url:?}: {e}", site.name)))?;
            }
            let selectors = [
                Some(site.link_selector.as_str()),
                Some(site.paragraph_selector.as_str()),
                site.trending_selector.as_deref(),
            ];
            for selector in selectors.into_iter().flatten() {
                Selector::parse(selector).map_err(|e| {
                    ConfigError::Invalid(format!("site `{}` selector {selector:?}: {e:?}", site.name))
                })?;
            }
        }
        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// Site name → primary collection, as the pipeline needs it.
    pub fn registry(&self) -> SiteRegistry {
        self.sites
            .iter()
            .fold(SiteRegistry::new(), |registry, site| {
                registry.with_site(&site.name, &site.collection)
            })
    }
}
