//! Story index and story page scraping for a configured site.

use super::{WAYBACK_HOST, captured_at, wayback_original};
use crate::config::SiteConfig;
use crate::models::{Fragment, RawExtraction};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

/// Index a site's start page for story URLs.
///
/// Links under `link_selector` are resolved against the start URL and kept
/// only when they point into one of the site's allowed domains. For a site
/// pinned to a Wayback snapshot the archived start page is indexed instead.
///
/// # Returns
///
/// Absolute story URLs in page order without repeats, or an error if the
/// start page fetch fails.
#[instrument(level = "info", skip_all, fields(site = %site.name, wayback = ?site.wayback))]
pub async fn index_articles(client: &Client, site: &SiteConfig) -> Result<Vec<String>, Box<dyn Error>> {
    let entry_url = Url::parse(&site.entry_url())?;
    let link_selector = Selector::parse(&site.link_selector).map_err(|e| format!("{e:?}"))?;

    let response = client.get(entry_url).send().await?.error_for_status()?;
    // The archive redirects to the closest snapshot it holds.
    let base_url = response.url().clone();
    let html = response.text().await?;
    let article_urls = extract_links(&html, &base_url, &link_selector, &site.allowed_domains);

    info!(
        count = article_urls.len(),
        source = %base_url,
        "Indexed article URLs"
    );
    debug!(urls = ?article_urls, "Article URLs");
    Ok(article_urls)
}

/// Fetch one story page and pull its paragraph fragments.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `site` - Site whose `paragraph_selector` applies to the page
/// * `url` - Story URL, live or a Wayback snapshot
///
/// # Returns
///
/// The page's fragments with `captured_at` set to the snapshot time for
/// archived pages and to the fetch time otherwise.
///
/// # Errors
///
/// Returns an error when the selector does not parse, the request fails or
/// the server answers with a non-success status.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_extraction(client: &Client, site: &SiteConfig, url: &str) -> Result<RawExtraction, Box<dyn Error>> {
    let paragraph_selector = Selector::parse(&site.paragraph_selector).map_err(|e| format!("{e:?}"))?;

    let response = client.get(url).send().await?.error_for_status()?;
    let final_url = response.url().to_string();
    let body = response.text().await?;

    let extraction = extraction_from_page(&final_url, &body, &paragraph_selector, Utc::now());
    debug!(fragments = extraction.fragments.len(), captured_at = %extraction.captured_at, "Parsed story page");
    Ok(extraction)
}

/// Build the extraction for a story page already downloaded from `url`.
pub fn extraction_from_page(url: &str, html: &str, selector: &Selector, fetched_at: DateTime<Utc>) -> RawExtraction {
    RawExtraction::new(url, extract_fragments(html, selector), captured_at(url, fetched_at))
}

/// Story links on a start page, resolved and filtered to `allowed_domains`.
///
/// Wayback snapshot links are kept as archive URLs and filtered by the URL
/// they wrap.
pub fn extract_links(html: &str, base_url: &Url, selector: &Selector, allowed_domains: &[String]) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| link_allowed(url, allowed_domains))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .unique()
        .collect()
}

/// One fragment per node matching `selector`.
///
/// Only the node's own text children are read, not text inside nested
/// elements. A node with no text children is recorded as skipped.
pub fn extract_fragments(html: &str, selector: &Selector) -> Vec<Fragment> {
    let document = Html::parse_document(html);
    document.select(selector).map(direct_text).collect()
}

fn direct_text(element: ElementRef<'_>) -> Fragment {
    let chunks: Vec<String> = element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.to_string())
        .collect();

    if chunks.is_empty() {
        Fragment::Skipped {
            reason: format!("<{}> has no direct text", element.value().name()),
        }
    } else {
        Fragment::Text(chunks)
    }
}

fn link_allowed(url: &Url, allowed_domains: &[String]) -> bool {
    match url.host_str() {
        Some(WAYBACK_HOST) => wayback_original(url)
            .is_some_and(|original| original.host_str().is_some_and(|host| is_allowed(host, allowed_domains))),
        Some(host) => is_allowed(host, allowed_domains),
        None => false,
    }
}

fn is_allowed(host: &str, allowed_domains: &[String]) -> bool {
    allowed_domains.iter().any(|domain| {
        host == domain.as_str()
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
