//! The story ingestion pipeline: normalize, tag, dedupe, fan out.
//!
//! # Write order
//!
//! One [`IngestPipeline::ingest`] call is strictly sequential:
//!
//! 1. count documents in the primary collection with the same `story`
//! 2. insert into the primary collection
//! 3. insert an independent copy into each tag collection, in tag order
//!
//! A storage failure stops the sequence and is returned as is. Writes that
//! already landed stay; there is no rollback. Two concurrent calls with the
//! same text can both see a zero count and both insert.

use crate::models::{IngestOutcome, NormalizedStory, RawExtraction, StoryDocument};
use crate::storage::{DocumentStore, StorageError};
use crate::tagger::tag_collection_name;
use crate::utils::truncate_for_log;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why an ingest call failed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The target site has no configured primary collection.
    #[error("no collection configured for site `{0}`")]
    UnknownSite(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    /// Collection named by a storage failure, if this is one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            IngestError::Storage(e) => Some(&e.collection),
            IngestError::UnknownSite(_) => None,
        }
    }
}

/// Explicit mapping from crawl target name to its primary collection.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    collections: HashMap<String, String>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `site` to write into `collection`.
    pub fn with_site(mut self, site: impl Into<String>, collection: impl Into<String>) -> Self {
        self.collections.insert(site.into(), collection.into());
        self
    }

    pub fn primary_collection(&self, site: &str) -> Option<&str> {
        self.collections.get(site).map(String::as_str)
    }
}

/// Dedupe-and-fan-out writer over a shared [`DocumentStore`].
///
/// Holds only borrowed, read-only state, so one pipeline can serve any
/// number of concurrent callers.
#[derive(Debug)]
pub struct IngestPipeline<'a, S> {
    store: &'a S,
    sites: &'a SiteRegistry,
}

impl<'a, S> IngestPipeline<'a, S>
where
    S: DocumentStore,
{
    pub fn new(store: &'a S, sites: &'a SiteRegistry) -> Self {
        Self { store, sites }
    }

    /// Normalize `extraction` and store it under `target_site`'s collections.
    ///
    /// The primary collection is looked up in the [`SiteRegistry`]; the
    /// story is then normalized, tagged and handed to [`Self::ingest_story`].
    ///
    /// # Arguments
    ///
    /// * `target_site` - Configured site name selecting the primary collection
    /// * `extraction` - Paragraph fragments and capture time of one page
    ///
    /// # Returns
    ///
    /// [`IngestOutcome::Duplicate`] if the primary collection already holds
    /// identical text, otherwise [`IngestOutcome::Inserted`] with the tag
    /// collections written.
    ///
    /// # Errors
    ///
    /// - [`IngestError::UnknownSite`] if `target_site` has no collection
    /// - [`IngestError::Storage`] if the duplicate check or any insert fails;
    ///   inserts made before the failure are kept
    #[instrument(level = "info", skip_all, fields(%target_site, source = %extraction.source))]
    pub async fn ingest(&self, target_site: &str, extraction: &RawExtraction) -> Result<IngestOutcome, IngestError> {
        let primary = self
            .sites
            .primary_collection(target_site)
            .ok_or_else(|| IngestError::UnknownSite(target_site.to_string()))?;

        let story = NormalizedStory::from(extraction);
        if story.skipped_fragments > 0 {
            warn!(
                skipped = story.skipped_fragments,
                kept = extraction.text_fragments(),
                "Some fragments were skipped during extraction"
            );
        }

        Ok(self.ingest_story(primary, &story).await?)
    }

    /// Store an already normalized story in `primary` and its tag collections.
    ///
    /// # Arguments
    ///
    /// * `primary` - Collection checked for duplicates and written first
    /// * `story` - Normalized, tagged story
    ///
    /// # Returns
    ///
    /// The outcome, with tag collections listed in write order.
    ///
    /// # Errors
    ///
    /// The first [`StorageError`] hit. Nothing is retried or rolled back, so
    /// a failing tag insert leaves the primary copy in place.
    #[instrument(level = "debug", skip_all, fields(%primary, tags = ?story.tags))]
    pub async fn ingest_story(&self, primary: &str, story: &NormalizedStory) -> Result<IngestOutcome, StorageError> {
        let document = story.story_document();
        let existing = self
            .store
            .count_matching(primary, StoryDocument::STORY_FIELD, &document.story)
            .await?;

        if existing > 0 {
            debug!(existing, story = %truncate_for_log(&document.story, 80), "Duplicate story; skipping");
            return Ok(IngestOutcome::Duplicate);
        }

        let body = document.as_document();
        self.store.insert(primary, &body).await?;

        let mut tag_collections_written = Vec::with_capacity(story.tags.len());
        for tag in &story.tags {
            let collection = tag_collection_name(tag);
            self.store.insert(&collection, &body).await?;
            tag_collections_written.push(collection);
        }

        info!(
            timestamp = document.timestamp,
            bytes = document.story.len(),
            tag_collections = ?tag_collections_written,
            "Inserted story"
        );
        Ok(IngestOutcome::Inserted { tag_collections_written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fragment;
    use crate::storage::{Document, MemoryStore, StorageOperation};
    use chrono::{TimeZone, Utc};

    /// Memory store that fails every insert into one collection.
    struct FailingStore {
        inner: MemoryStore,
        fail_on: &'static str,
    }

    impl DocumentStore for FailingStore {
        async fn count_matching(&self, collection: &str, field: &str, value: &str) -> Result<u64, StorageError> {
            self.inner.count_matching(collection, field, value).await
        }

        async fn insert(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
            if collection == self.fail_on {
                return Err(StorageError::new(collection, StorageOperation::Insert, "connection reset"));
            }
            self.inner.insert(collection, document).await
        }

        async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
            self.inner.find_all(collection).await
        }

        async fn list_collections(&self) -> Result<Vec<String>, StorageError> {
            self.inner.list_collections().await
        }

        async fn drop_collection(&self, collection: &str) -> Result<(), StorageError> {
            self.inner.drop_collection(collection).await
        }
    }

    fn extraction(parts: &[&str]) -> RawExtraction {
        RawExtraction::new(
            "https://www.bostonglobe.com/metro/story",
            parts.iter().map(|p| Fragment::text([*p])).collect(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    fn registry() -> SiteRegistry {
        SiteRegistry::new()
            .with_site("globe", "globe_stories")
            .with_site("wgbh", "wgbh_stories")
    }

    #[tokio::test]
    async fn test_back_bay_scenario() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let outcome = pipeline
            .ingest("globe", &extraction(&["Residents of ", "Back Bay", " reported flooding."]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IngestOutcome::Inserted {
                tag_collections_written: vec!["back_bay".to_string()]
            }
        );

        let expected = StoryDocument {
            timestamp: 1_700_000_000,
            story: "Residents of  Back Bay  reported flooding.".to_string(),
        }
        .as_document();
        assert_eq!(store.find_all("globe_stories").await.unwrap(), vec![expected.clone()]);
        assert_eq!(store.find_all("back_bay").await.unwrap(), vec![expected]);
        assert_eq!(store.total_documents(), 2);
    }

    #[tokio::test]
    async fn test_second_identical_story_is_duplicate() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);
        let page = extraction(&["Roxbury library reopens"]);

        let first = pipeline.ingest("wgbh", &page).await.unwrap();
        assert!(matches!(first, IngestOutcome::Inserted { .. }));
        let before = store.total_documents();

        let second = pipeline.ingest("wgbh", &page).await.unwrap();
        assert_eq!(second, IngestOutcome::Duplicate);
        assert_eq!(store.total_documents(), before);
    }

    #[tokio::test]
    async fn test_dedup_is_per_primary_collection() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);
        let page = extraction(&["Council votes on budget"]);

        pipeline.ingest("globe", &page).await.unwrap();
        let other = pipeline.ingest("wgbh", &page).await.unwrap();
        assert!(matches!(other, IngestOutcome::Inserted { .. }));
    }

    #[tokio::test]
    async fn test_fan_out_count() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let outcome = pipeline
            .ingest("globe", &extraction(&["Parade from the North End", "ends in Chinatown"]))
            .await
            .unwrap();

        let IngestOutcome::Inserted { tag_collections_written } = outcome else {
            panic!("expected an insert");
        };
        assert_eq!(tag_collections_written.len(), 2);
        assert!(tag_collections_written.contains(&"north_end".to_string()));
        assert!(tag_collections_written.contains(&"chinatown".to_string()));

        assert_eq!(store.len("globe_stories"), 1);
        assert_eq!(store.len("north_end"), 1);
        assert_eq!(store.len("chinatown"), 1);
        assert_eq!(store.total_documents(), 3);
    }

    #[tokio::test]
    async fn test_untagged_story_only_hits_primary() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let outcome = pipeline.ingest("globe", &extraction(&["Statewide tax news"])).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Inserted {
                tag_collections_written: vec![]
            }
        );
        assert_eq!(store.list_collections().await.unwrap(), vec!["globe_stories"]);
    }

    #[tokio::test]
    async fn test_empty_extraction_is_stored() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);
        let empty = RawExtraction::new("https://www.wgbh.org/", vec![], Utc.timestamp_opt(5, 0).unwrap());

        let outcome = pipeline.ingest("wgbh", &empty).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Inserted { .. }));
        assert_eq!(store.count_matching("wgbh_stories", "story", "").await.unwrap(), 1);

        assert_eq!(pipeline.ingest("wgbh", &empty).await.unwrap(), IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_partial_fan_out_failure_keeps_primary_write() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_on: "fenway",
        };
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let err = pipeline
            .ingest("globe", &extraction(&["Traffic near Fenway and in Allston"]))
            .await
            .unwrap_err();

        assert_eq!(err.collection(), Some("fenway"));
        let IngestError::Storage(storage) = err else {
            panic!("expected a storage error");
        };
        assert_eq!(storage.operation, StorageOperation::Insert);

        assert_eq!(store.inner.len("globe_stories"), 1);
        // Allston comes before Fenway in the vocabulary, so it was written first.
        assert_eq!(store.inner.len("allston"), 1);
        assert_eq!(store.inner.len("fenway"), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_writes_nothing() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_on: "globe_stories",
        };
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let err = pipeline.ingest("globe", &extraction(&["Mission Hill"])).await.unwrap_err();
        assert_eq!(err.collection(), Some("globe_stories"));
        assert_eq!(store.inner.total_documents(), 0);
    }

    #[tokio::test]
    async fn test_unknown_site_is_rejected() {
        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);

        let err = pipeline.ingest("herald", &extraction(&["anything"])).await.unwrap_err();
        assert!(matches!(err, IngestError::UnknownSite(ref s) if s == "herald"));
        assert_eq!(err.collection(), None);
        assert_eq!(store.total_documents(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_ingest_over_shared_store() {
        use futures::stream::{self, StreamExt};

        let store = MemoryStore::new();
        let sites = registry();
        let pipeline = IngestPipeline::new(&store, &sites);
        let pages: Vec<RawExtraction> = (0..20)
            .map(|i| {
                let text = format!("Story {i} from Dorchester");
                extraction(&[text.as_str()])
            })
            .collect();

        let outcomes: Vec<_> = stream::iter(pages.iter())
            .map(|page| pipeline.ingest("globe", page))
            .buffer_unordered(4)
            .collect()
            .await;

        assert!(outcomes.iter().all(|o| matches!(o, Ok(IngestOutcome::Inserted { .. }))));
        assert_eq!(store.len("globe_stories"), 20);
        assert_eq!(store.len("dorchester"), 20);
    }

    #[tokio::test]
    async fn test_dedup_survives_file_store_reopen() {
        use crate::storage::JsonFileStore;

        let dir = tempfile::tempdir().unwrap();
        let sites = registry();
        let page = extraction(&["Residents of ", "Back Bay", " reported flooding."]);

        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        let first = IngestPipeline::new(&store, &sites).ingest("globe", &page).await.unwrap();
        assert_eq!(
            first,
            IngestOutcome::Inserted {
                tag_collections_written: vec!["back_bay".to_string()]
            }
        );
        store.close().await.unwrap();

        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        let second = IngestPipeline::new(&store, &sites).ingest("globe", &page).await.unwrap();
        assert_eq!(second, IngestOutcome::Duplicate);
        store.close().await.unwrap();

        let database = dir.path().join("scraped");
        for collection in ["globe_stories.jsonl", "back_bay.jsonl"] {
            let body = std::fs::read_to_string(database.join(collection)).unwrap();
            assert_eq!(body.lines().count(), 1, "{collection}");
        }
    }
}
