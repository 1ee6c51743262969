//! Trending-bar scraping.
//!
//! Both sites render a bar of hot topics at the top of the page. Each link
//! is stored with its text chunks and `href`, one snapshot per capture.

use super::captured_at;
use crate::config::SiteConfig;
use crate::models::{TrendingSnapshot, TrendingTopic};
use chrono::Utc;
use reqwest::Client;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{info, instrument};

/// Fetch a site's trending bar.
///
/// # Returns
///
/// `Ok(None)` when the site has no trending selector configured, otherwise
/// the snapshot (possibly with no items).
#[instrument(level = "info", skip_all, fields(site = %site.name))]
pub async fn fetch_trending(client: &Client, site: &SiteConfig) -> Result<Option<TrendingSnapshot>, Box<dyn Error>> {
    let Some(selector) = site.trending_selector.as_deref() else {
        return Ok(None);
    };
    let selector = Selector::parse(selector).map_err(|e| format!("{e:?}"))?;
    let response = client.get(site.trending_page_url()).send().await?.error_for_status()?;
    let url = response.url().to_string();
    let html = response.text().await?;
    let items = extract_trending(&html, &selector);
    info!(count = items.len(), %url, "Fetched trending topics");

    Ok(Some(TrendingSnapshot {
        timestamp: captured_at(&url, Utc::now()).timestamp(),
        items,
    }))
}

/// Topic text and link for every node matching `selector`.
pub fn extract_trending(html: &str, selector: &Selector) -> Vec<TrendingTopic> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|element| TrendingTopic {
            topic: element
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|text| text.to_string())
                .collect(),
            link: element.value().attr("href").map(str::to_string).into_iter().collect(),
        })
        .collect()
}
