//! Progress queries

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ingest::coordinator::progress_key;
use crate::progress::{ProgressRecord, ProgressTracker};

/// Query string accepted by `GET /progress`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetProgressQuery {
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GetProgressError {
    #[error("fileName parameter is required")]
    FileNameRequired,
    #[error("File '{0}' not found or not being processed")]
    NotFound(String),
}

/// Look up one file's progress.
///
/// Clients may send a path; only its base name is used as the key.
pub fn handle(tracker: &ProgressTracker, query: GetProgressQuery) -> Result<ProgressRecord, GetProgressError> {
    let raw = query
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(GetProgressError::FileNameRequired)?;

    let key = progress_key(Path::new(raw));
    tracker.get(&key).ok_or(GetProgressError::NotFound(key))
}

/// Every tracked file, most recently started first
pub fn handle_all(tracker: &ProgressTracker) -> Vec<ProgressRecord> {
    let mut records = tracker.get_all();
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.file_name.cmp(&b.file_name)));
    records
}
