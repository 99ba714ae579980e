//! Ingestion pipeline errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Errors surfaced by the ingestion pipeline
///
/// [`IngestError::Open`], [`IngestError::Count`] and [`IngestError::Stream`]
/// end a run before any row is queued; the others are absorbed inside the pool
/// and logged.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to count records: {0}")]
    Count(#[source] rollcall_common::RollcallError),

    #[error("Failed to reopen file for streaming: {0}")]
    Stream(#[source] rollcall_common::RollcallError),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Worker admission closed")]
    AdmissionClosed(#[from] tokio::sync::AcquireError),
}

/// Errors from a [`StudentStore`](super::store::StudentStore) implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
