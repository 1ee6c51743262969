//! Data models for extracted pages, normalized stories and stored documents.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`RawExtraction`]: Paragraph fragments pulled from one crawled page
//! - [`NormalizedStory`]: Flattened, cleaned and tagged story text
//! - [`StoryDocument`]: The document shape written to the store
//! - [`TrendingSnapshot`]: Trending-bar topics captured from a front page
//! - [`IngestOutcome`]: What the pipeline did with one story

use crate::storage::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of reading one matched HTML node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// The direct text chunks of the node, in document order.
    Text(Vec<String>),
    /// The node matched but yielded nothing readable.
    Skipped { reason: String },
}

impl Fragment {
    /// Build a text fragment from anything string-like.
    pub fn text<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fragment::Text(chunks.into_iter().map(Into::into).collect())
    }
}

/// The raw text fragments pulled from one crawled page.
///
/// Produced by the scrapers and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RawExtraction {
    /// Source URL, kept for logging only.
    pub source: String,
    /// One entry per matched paragraph node.
    pub fragments: Vec<Fragment>,
    /// When the page snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl RawExtraction {
    pub fn new(source: impl Into<String>, fragments: Vec<Fragment>, captured_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            fragments,
            captured_at,
        }
    }

    /// Number of fragments that produced text.
    pub fn text_fragments(&self) -> usize {
        self.fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Text(_)))
            .count()
    }
}

/// A story after flattening, cleanup and neighborhood tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStory {
    /// Flattened story text.
    pub text: String,
    /// Carried through from the extraction.
    pub captured_at: DateTime<Utc>,
    /// Matched neighborhoods, in vocabulary order.
    pub tags: Vec<String>,
    /// How many fragments were skipped during extraction.
    pub skipped_fragments: usize,
}

impl NormalizedStory {
    /// Build the document that gets persisted for this story.
    pub fn story_document(&self) -> StoryDocument {
        StoryDocument {
            timestamp: self.captured_at.timestamp(),
            story: self.text.clone(),
        }
    }
}

/// What the store holds for each story.
///
/// Dedup identity is the exact value of `story`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDocument {
    /// Capture time in epoch seconds.
    pub timestamp: i64,
    /// Normalized story text.
    pub story: String,
}

impl StoryDocument {
    /// Name of the field used for duplicate checks.
    pub const STORY_FIELD: &'static str = "story";

    pub fn as_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("timestamp".to_string(), self.timestamp.into());
        doc.insert(Self::STORY_FIELD.to_string(), self.story.clone().into());
        doc
    }
}

/// One entry of a site's trending bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingTopic {
    /// Direct text chunks of the link.
    pub topic: Vec<String>,
    /// `href` values of the link.
    pub link: Vec<String>,
}

/// The trending bar of a front page at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingSnapshot {
    pub timestamp: i64,
    pub items: Vec<TrendingTopic>,
}

/// What [`crate::pipeline::IngestPipeline`] did with a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A story with identical text already exists in the primary collection.
    Duplicate,
    /// The story was written to the primary collection and to these tag
    /// collections, in write order.
    Inserted { tag_collections_written: Vec<String> },
}
