//! MongoDB document store.
//!
//! Collections map one-to-one onto collections of the configured database
//! (`scraped` by default). Documents cross the boundary as relaxed extended
//! JSON, so a server-assigned `_id` comes back as `{"$oid": "..."}`.

use super::{Document, DocumentStore, StorageError, StorageOperation};
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info, instrument};

/// A MongoDB database reached through one shared client.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect to `url` and select `database`.
    ///
    /// # Arguments
    ///
    /// * `url` - Connection string, e.g. `mongodb://localhost:27017/`
    /// * `database` - Database holding every collection
    ///
    /// # Returns
    ///
    /// A store whose server answered a `ping`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] for a malformed connection string or an
    /// unreachable server.
    #[instrument(level = "info", skip_all, fields(%database))]
    pub async fn open(url: &str, database: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| StorageError::new(database, StorageOperation::List, e))?;
        let database = client.database(database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::new(database.name(), StorageOperation::List, e))?;
        info!("Connected to MongoDB");
        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }

    /// Shut the client down, waiting for in-flight operations.
    #[instrument(level = "info", skip_all, fields(database = %self.database.name()))]
    pub async fn close(self) {
        self.client.shutdown().await;
        info!("Closed MongoDB client");
    }
}

impl DocumentStore for MongoStore {
    async fn count_matching(&self, collection: &str, field: &str, value: &str) -> Result<u64, StorageError> {
        self.collection(collection)
            .count_documents(equals_filter(field, value))
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Count, e))
    }

    async fn insert(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
        let document = to_bson(document).map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
        let result = self
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Insert, e))?;
        debug!(%collection, id = %result.inserted_id, "Inserted document");
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let cursor = self
            .collection(collection)
            .find(doc! {})
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Find, e))?;
        let documents: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Find, e))?;
        documents
            .into_iter()
            .map(|d| from_bson(d).map_err(|e| StorageError::new(collection, StorageOperation::Find, e)))
            .collect()
    }

    async fn list_collections(&self) -> Result<Vec<String>, StorageError> {
        let mut names = self
            .database
            .list_collection_names()
            .await
            .map_err(|e| StorageError::new(self.database.name(), StorageOperation::List, e))?;
        names.sort();
        Ok(names)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StorageError> {
        self.collection(collection)
            .drop()
            .await
            .map_err(|e| StorageError::new(collection, StorageOperation::Drop, e))
    }
}

fn equals_filter(field: &str, value: &str) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(field, value);
    filter
}

fn to_bson(document: &Document) -> Result<BsonDocument, bson::ser::Error> {
    bson::to_document(document)
}

fn from_bson(document: BsonDocument) -> Result<Document, String> {
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {other}")),
    }
}
