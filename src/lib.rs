//! # neighborhood_news
//!
//! Scrape Boston local news, tag each story with the neighborhoods it
//! mentions and store it once per site plus once per neighborhood.
//!
//! ## Architecture
//!
//! 1. **Scraping** ([`scrapers`]): index a site's start page, fetch story
//!    pages, pull paragraph fragments into a [`models::RawExtraction`]
//! 2. **Normalization** ([`normalize`], [`tagger`]): flatten fragments into
//!    one story string and match it against the neighborhood list
//! 3. **Ingestion** ([`pipeline`]): skip exact duplicates, then write the
//!    story to the site's collection and to every matched neighborhood's
//!    collection
//! 4. **Analysis and export** ([`analysis`], [`outputs`]): word counts and
//!    JSON dumps of stored collections
//!
//! Storage sits behind [`storage::DocumentStore`]; the caller opens one
//! store and lends it to everything above.

pub mod analysis;
pub mod config;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod scrapers;
pub mod storage;
pub mod tagger;
pub mod utils;
