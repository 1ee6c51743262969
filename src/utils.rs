//! Utility functions for log formatting and file system checks.
//!
//! This module provides helper functions used throughout the crate:
//! - String truncation so story text doesn't flood the logs
//! - File system validation for store and export directories

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes, backing off to the
/// nearest character boundary, with an ellipsis and byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then creates and immediately
/// deletes a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn ensure_writable_dir(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    fs::File::create(&scratch_path).await?;
    let _ = fs::remove_file(&scratch_path).await;
    info!("Directory is writable");
    Ok(())
}
