//! Word frequency over stored stories.
//!
//! Each `story` is split on single spaces and empty words are dropped, so
//! punctuation stays attached ("flooding." and "flooding" are different
//! words). Results replace the `wc_<collection>` collection with one
//! `{_id: word, value: count}` document per word.

use crate::models::StoryDocument;
use crate::storage::{Document, DocumentStore, StorageError};
use std::collections::BTreeMap;
use tracing::{error, info, instrument};

/// Prefix of word-count output collections.
pub const WORD_COUNT_PREFIX: &str = "wc_";

/// Output collection for `collection`'s word counts.
pub fn word_count_collection(collection: &str) -> String {
    format!("{WORD_COUNT_PREFIX}{collection}")
}

/// Count space-separated words across `stories`.
pub fn count_words<'a>(stories: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for word in stories.into_iter().flat_map(|s| s.split(' ')).filter(|w| !w.is_empty()) {
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Count words in `collection` and store them in its `wc_` collection.
///
/// Documents without a string `story` field are ignored.
#[instrument(level = "info", skip(store))]
pub async fn word_count<S: DocumentStore>(store: &S, collection: &str) -> Result<BTreeMap<String, u64>, StorageError> {
    let documents = store.find_all(collection).await?;
    let counts = count_words(
        documents
            .iter()
            .filter_map(|d| d.get(StoryDocument::STORY_FIELD).and_then(|v| v.as_str())),
    );

    let output = word_count_collection(collection);
    store.drop_collection(&output).await?;
    for (word, value) in &counts {
        let mut doc = Document::new();
        doc.insert("_id".to_string(), word.clone().into());
        doc.insert("value".to_string(), (*value).into());
        store.insert(&output, &doc).await?;
    }

    info!(documents = documents.len(), words = counts.len(), %output, "Wrote word counts");
    Ok(counts)
}

/// Run [`word_count`] for every collection that is not itself a word count.
///
/// A collection that fails is logged and skipped.
///
/// # Returns
///
/// The collections that were counted successfully.
#[instrument(level = "info", skip_all)]
pub async fn word_count_all<S: DocumentStore>(store: &S) -> Result<Vec<String>, StorageError> {
    let collections = store.list_collections().await?;
    let mut counted = Vec::new();
    for collection in collections.iter().filter(|c| !c.starts_with(WORD_COUNT_PREFIX)) {
        match word_count(store, collection).await {
            Ok(_) => counted.push(collection.clone()),
            Err(e) => error!(%collection, error = %e, "Word count failed; skipping collection"),
        }
    }
    Ok(counted)
}
