//! Site scrapers feeding the ingestion pipeline.
//!
//! Each configured site is scraped in two phases:
//!
//! 1. **Indexing**: Collect story URLs from the site's start page
//! 2. **Fetching**: Download each story page and pull paragraph fragments
//!
//! Front pages are also scraped for their trending bar.
//!
//! # Supported Sources
//!
//! | Source | Start page | Stories | Trending |
//! |--------|------------|---------|----------|
//! | Boston Globe | `/metro` | `div.article-text > p` | front page bar |
//! | WGBH | `/news/local-news` | `div.RichTextArticleBody-body > p` | local news bar |
//!
//! Selectors live in [`crate::config::SiteConfig`], so other sites only need
//! a config entry. There is no recursive crawl: links are followed exactly
//! one hop from the start page.
//!
//! # Wayback snapshots
//!
//! A site with `wayback: YYYYMMDDhhmmss` (or `crawl --wayback`) is read from
//! the Internet Archive instead of live: its start page becomes
//! `https://web.archive.org/web/<ts>/<start_url>`, archived story links are
//! checked against `allowed_domains` by the URL they wrap, and every stored
//! timestamp is the snapshot time rather than the fetch time.

pub mod site;
pub mod trending;

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Host serving archived snapshots.
pub const WAYBACK_HOST: &str = "web.archive.org";

static WAYBACK_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"web\.archive\.org/web/(\d{14})").expect("valid wayback pattern"));

static WAYBACK_SNAPSHOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://web\.archive\.org/web/\d{14}[a-z_]*/(https?://.+)$").expect("valid snapshot pattern")
});

/// Archived copy of `url` as of `timestamp` (`YYYYMMDDhhmmss`).
pub fn wayback_url(timestamp: &str, url: &str) -> String {
    format!("https://{WAYBACK_HOST}/web/{timestamp}/{url}")
}

/// The live URL an archived snapshot URL wraps, if `url` is one.
pub fn wayback_original(url: &Url) -> Option<Url> {
    let original = WAYBACK_SNAPSHOT.captures(url.as_str())?.get(1)?.as_str();
    Url::parse(original).ok()
}

/// Parse a bare `YYYYMMDDhhmmss` snapshot timestamp.
pub fn parse_wayback_timestamp(digits: &str) -> Option<DateTime<Utc>> {
    if digits.len() != 14 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Snapshot time encoded in a Wayback Machine URL, if `url` is one.
pub fn wayback_timestamp(url: &str) -> Option<DateTime<Utc>> {
    let digits = WAYBACK_TIMESTAMP.captures(url)?.get(1)?.as_str();
    parse_wayback_timestamp(digits)
}

/// When a page fetched from `url` at `fetched_at` was captured.
pub fn captured_at(url: &str, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
    wayback_timestamp(url).unwrap_or(fetched_at)
}
