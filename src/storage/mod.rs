//! Document storage collaborators.
//!
//! The pipeline only ever talks to a [`DocumentStore`]. Three backends are
//! provided:
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | MongoDB | [`mongo`] | Selected with `--mongo-url` / `MONGO_URL` |
//! | JSON lines on disk | [`file`] | Offline default; one `.jsonl` file per collection |
//! | In-memory | [`memory`] | Tests and `--dry-run` crawls |
//!
//! A store handle is opened once by the caller and passed by reference to
//! whoever needs it; nothing in this crate keeps a global client.

pub mod file;
pub mod memory;
pub mod mongo;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::fmt;
use thiserror::Error;

/// A stored document: a flat JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Boxed cause carried by a [`StorageError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The storage call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Count,
    Insert,
    Find,
    List,
    Drop,
    Close,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageOperation::Count => "count",
            StorageOperation::Insert => "insert",
            StorageOperation::Find => "find",
            StorageOperation::List => "list",
            StorageOperation::Drop => "drop",
            StorageOperation::Close => "close",
        };
        f.write_str(name)
    }
}

/// A storage call could not complete.
#[derive(Debug, Error)]
#[error("{operation} on collection `{collection}` failed: {cause}")]
pub struct StorageError {
    /// Collection the failing call targeted.
    pub collection: String,
    pub operation: StorageOperation,
    #[source]
    pub cause: BoxError,
}

impl StorageError {
    pub fn new(collection: impl Into<String>, operation: StorageOperation, cause: impl Into<BoxError>) -> Self {
        Self {
            collection: collection.into(),
            operation,
            cause: cause.into(),
        }
    }
}

/// A document store grouped into named collections.
///
/// Implementations must be safe to share between concurrent callers; they
/// decide their own timeout and retry behavior.
pub trait DocumentStore {
    /// Count documents in `collection` whose string `field` equals `value`.
    async fn count_matching(&self, collection: &str, field: &str, value: &str) -> Result<u64, StorageError>;

    /// Append `document` to `collection`, creating the collection if needed.
    async fn insert(&self, collection: &str, document: &Document) -> Result<(), StorageError>;

    /// All documents in `collection` in insertion order. Missing collections are empty.
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StorageError>;

    /// Names of every collection holding at least one document, sorted.
    async fn list_collections(&self) -> Result<Vec<String>, StorageError>;

    /// Remove `collection` and everything in it. Missing collections are fine.
    async fn drop_collection(&self, collection: &str) -> Result<(), StorageError>;
}

/// True if `document[field]` is the string `value`.
pub(crate) fn field_equals(document: &Document, field: &str, value: &str) -> bool {
    document.get(field).and_then(|v| v.as_str()) == Some(value)
}
