//! JSON-lines document store on the local filesystem.
//!
//! # Layout
//!
//! ```text
//! store_dir/
//! └── scraped/                 # database
//!     ├── globe_stories.jsonl  # primary collection
//!     ├── back_bay.jsonl       # tag collection
//!     └── north_end.jsonl
//! ```
//!
//! Each line is one document. Append handles are opened lazily, kept for the
//! life of the store and synced on [`JsonFileStore::close`].

use super::{field_equals, Document, DocumentStore, StorageError, StorageOperation};
use crate::utils::ensure_writable_dir;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const EXTENSION: &str = "jsonl";

/// A database directory of `.jsonl` collections.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    handles: Mutex<HashMap<String, File>>,
}

impl JsonFileStore {
    /// Open (creating if needed) the database `database` under `store_dir`.
    ///
    /// # Arguments
    ///
    /// * `store_dir` - Directory holding every database
    /// * `database` - Database name; becomes the `store_dir/<database>` directory
    ///
    /// # Returns
    ///
    /// A store with no open handles. Existing `.jsonl` collections in the
    /// directory are read as they are, so a reopened store sees earlier writes.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when `database` is not a plain name or the
    /// directory cannot be created or written.
    ///
    /// # Examples
    ///
    /// ```
    /// use neighborhood_news::storage::{DocumentStore, JsonFileStore};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let dir = tempfile::tempdir()?;
    /// let store = JsonFileStore::open(dir.path(), "scraped").await?;
    /// assert_eq!(store.root(), dir.path().join("scraped"));
    /// assert!(store.list_collections().await?.is_empty());
    /// store.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(level = "info", skip_all, fields(store_dir = %store_dir.as_ref().display(), %database))]
    pub async fn open(store_dir: impl AsRef<Path>, database: &str) -> Result<Self, StorageError> {
        check_name(database, StorageOperation::List)?;
        let root = store_dir.as_ref().join(database);
        ensure_writable_dir(&root)
            .await
            .map_err(|e| StorageError::new(database, StorageOperation::List, e))?;
        info!(root = %root.display(), "Opened document store");
        Ok(Self {
            root,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding this database's collections.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.{EXTENSION}"))
    }

    async fn read_collection(&self, collection: &str, operation: StorageOperation) -> Result<Vec<Document>, StorageError> {
        check_name(collection, operation)?;
        let path = self.collection_path(collection);
        let body = match fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::new(collection, operation, e)),
        };

        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<Document>(line).map_err(|e| StorageError::new(collection, operation, e))
            })
            .collect()
    }

    /// Sync and release every open handle.
    #[instrument(level = "info", skip_all, fields(root = %self.root.display()))]
    pub async fn close(self) -> Result<(), StorageError> {
        let handles = self.handles.into_inner();
        let open = handles.len();
        for (collection, mut file) in handles {
            file.flush()
                .await
                .map_err(|e| StorageError::new(&collection, StorageOperation::Close, e))?;
            file.sync_all()
                .await
                .map_err(|e| StorageError::new(&collection, StorageOperation::Close, e))?;
        }
        info!(open_handles = open, "Closed document store");
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    async fn count_matching(&self, collection: &str, field: &str, value: &str) -> Result<u64, StorageError> {
        // Hold the handle map so no insert lands half-written under us.
        let _handles = self.handles.lock().await;
        let docs = self.read_collection(collection, StorageOperation::Count).await?;
        Ok(docs.iter().filter(|d| field_equals(d, field, value)).count() as u64)
    }

    async fn insert(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
        check_name(collection, StorageOperation::Insert)?;
        let mut line = serde_json::to_string(document)
            .map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
        line.push('\n');

        let mut handles = self.handles.lock().await;
        if !handles.contains_key(collection) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.collection_path(collection))
                .await
                .map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
            debug!(%collection, "Opened collection file");
            handles.insert(collection.to_string(), file);
        }

        let file = handles
            .get_mut(collection)
            .ok_or_else(|| StorageError::new(collection, StorageOperation::Insert, "handle vanished"))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let _handles = self.handles.lock().await;
        self.read_collection(collection, StorageOperation::Find).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, StorageError> {
        let _handles = self.handles.lock().await;
        let list_err = |e: io::Error| StorageError::new("*", StorageOperation::List, e);

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(list_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "Skipping collection file with a non UTF-8 name");
                continue;
            };
            if entry.metadata().await.map_err(list_err)?.len() > 0 {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StorageError> {
        check_name(collection, StorageOperation::Drop)?;
        let mut handles = self.handles.lock().await;
        handles.remove(collection);
        match fs::remove_file(self.collection_path(collection)).await {
            Ok(()) => {
                info!(%collection, "Dropped collection");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(collection, StorageOperation::Drop, e)),
        }
    }
}

/// Collection and database names become file names; keep them to one path segment.
fn check_name(name: &str, operation: StorageOperation) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if valid {
        Ok(())
    } else {
        Err(StorageError::new(name, operation, format!("invalid collection name {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(timestamp: i64, story: &str) -> Document {
        let mut d = Document::new();
        d.insert("timestamp".to_string(), timestamp.into());
        d.insert("story".to_string(), story.into());
        d
    }

    #[tokio::test]
    async fn test_insert_count_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();

        store.insert("globe", &doc(1, "first")).await.unwrap();
        store.insert("globe", &doc(2, "second")).await.unwrap();
        store.insert("globe", &doc(3, "first")).await.unwrap();

        assert_eq!(store.count_matching("globe", "story", "first").await.unwrap(), 2);
        assert_eq!(store.count_matching("globe", "story", "third").await.unwrap(), 0);
        assert_eq!(store.count_matching("nowhere", "story", "first").await.unwrap(), 0);

        let docs = store.find_all("globe").await.unwrap();
        assert_eq!(docs, vec![doc(1, "first"), doc(2, "second"), doc(3, "first")]);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        store.insert("north_end", &doc(7, "cannoli")).await.unwrap();
        store.close().await.unwrap();

        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        assert_eq!(store.find_all("north_end").await.unwrap(), vec![doc(7, "cannoli")]);
        assert!(dir.path().join("scraped").join("north_end.jsonl").exists());
    }

    #[tokio::test]
    async fn test_list_and_drop_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        store.insert("wgbh", &doc(1, "a")).await.unwrap();
        store.insert("chinatown", &doc(1, "a")).await.unwrap();
        std::fs::write(store.root().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["chinatown", "wgbh"]);

        store.drop_collection("wgbh").await.unwrap();
        store.drop_collection("wgbh").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["chinatown"]);

        // Writing after a drop reopens the file.
        store.insert("wgbh", &doc(2, "b")).await.unwrap();
        assert_eq!(store.find_all("wgbh").await.unwrap(), vec![doc(2, "b")]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();

        let err = store.insert("../escape", &doc(1, "a")).await.unwrap_err();
        assert_eq!(err.collection, "../escape");
        assert_eq!(err.operation, StorageOperation::Insert);
        assert!(store.insert("", &doc(1, "a")).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path(), "scraped").await.unwrap();
        std::fs::write(store.root().join("globe.jsonl"), "{not json}\n").unwrap();

        let err = store.count_matching("globe", "story", "x").await.unwrap_err();
        assert_eq!(err.collection, "globe");
        assert_eq!(err.operation, StorageOperation::Count);
    }
}
