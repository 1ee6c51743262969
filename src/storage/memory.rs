//! In-process document store.

use super::{field_equals, Document, DocumentStore, StorageError, StorageOperation};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Collections held in a map behind a mutex. Cloned documents go in and out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Total number of documents across all collections.
    pub fn total_documents(&self) -> usize {
        self.collections
            .lock()
            .map(|c| c.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn lock(
        &self,
        collection: &str,
        operation: StorageOperation,
    ) -> Result<MutexGuard<'_, BTreeMap<String, Vec<Document>>>, StorageError> {
        self.collections
            .lock()
            .map_err(|e| StorageError::new(collection, operation, e.to_string()))
    }
}

impl DocumentStore for MemoryStore {
    async fn count_matching(&self, collection: &str, field: &str, value: &str) -> Result<u64, StorageError> {
        let collections = self.lock(collection, StorageOperation::Count)?;
        let count = collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| field_equals(d, field, value)).count());
        Ok(count as u64)
    }

    async fn insert(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
        let mut collections = self.lock(collection, StorageOperation::Insert)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let collections = self.lock(collection, StorageOperation::Find)?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StorageError> {
        let collections = self.lock("*", StorageOperation::List)?;
        Ok(collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StorageError> {
        let mut collections = self.lock(collection, StorageOperation::Drop)?;
        collections.remove(collection);
        Ok(())
    }
}
