//! JSON export of stored collections.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── globe_stories.json
//! └── back_bay.json
//! ```
//!
//! Each file is a pretty-printed array of the collection's documents in
//! insertion order.

use crate::storage::DocumentStore;
use crate::utils::ensure_writable_dir;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write every document of `collection` to `{output_dir}/{collection}.json`.
///
/// # Returns
///
/// The written path and the number of documents exported.
#[instrument(level = "info", skip(store, output_dir), fields(output_dir = %output_dir.as_ref().display()))]
pub async fn export_collection<S: DocumentStore>(
    store: &S,
    collection: &str,
    output_dir: impl AsRef<Path>,
) -> Result<(PathBuf, usize), Box<dyn Error>> {
    let output_dir = output_dir.as_ref();
    let documents = store.find_all(collection).await?;
    let json = serde_json::to_string_pretty(&documents)?;

    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(error = %e, "Export directory is not writable");
        return Err(e.into());
    }

    let path = output_dir.join(format!("{collection}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), count = documents.len(), "Exported collection");
    Ok((path, documents.len()))
}
