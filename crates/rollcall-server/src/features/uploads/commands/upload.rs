//! Upload command
//!
//! Saves every `files` part of a multipart request under the upload directory,
//! then starts one background ingestion run per saved file.

use axum::extract::{multipart::Field, multipart::MultipartError, Multipart};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::ingest::IngestionCoordinator;

/// Multipart field name carrying uploaded files.
pub const FILES_FIELD: &str = "files";

/// Longest file name accepted.
pub const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadFilesResponse {
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),
    #[error("File '{0}' appears more than once in this upload")]
    DuplicateFileName(String),
    #[error("File '{0}' is still being processed")]
    StillProcessing(String),
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Failed to save upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce a client-supplied name to its base name.
///
/// Both `/` and `\` count as separators, so no upload can land outside the
/// upload directory.
pub fn sanitize_file_name(raw: &str) -> Result<String, UploadError> {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." || base.len() > MAX_FILE_NAME_LEN {
        return Err(UploadError::InvalidFileName(raw.to_string()));
    }

    Ok(base.to_string())
}

async fn save_field(dir: &Path, file_name: &str, mut field: Field<'_>) -> Result<(PathBuf, u64), UploadError> {
    let path = dir.join(file_name);
    let mut file = tokio::fs::File::create(&path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok((path, written))
}

#[tracing::instrument(skip(coordinator, multipart))]
pub async fn handle(
    coordinator: Arc<IngestionCoordinator>,
    mut multipart: Multipart,
) -> Result<UploadFilesResponse, UploadError> {
    let upload_dir = coordinator.config().upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir).await?;

    let mut saved: Vec<(String, PathBuf)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let file_name = sanitize_file_name(&raw_name)?;
        if saved.iter().any(|(name, _)| *name == file_name) {
            return Err(UploadError::DuplicateFileName(file_name));
        }
        // Saving truncates the file, which a running ingestion may still be reading.
        if coordinator.tracker().is_processing(&file_name) {
            return Err(UploadError::StillProcessing(file_name));
        }

        let (path, size) = save_field(&upload_dir, &file_name, field).await?;

        tracing::info!(file_name = %file_name, size, path = %path.display(), "Upload saved");
        saved.push((file_name, path));
    }

    if saved.is_empty() {
        return Err(UploadError::NoFiles);
    }

    let mut files = Vec::with_capacity(saved.len());
    for (file_name, path) in saved {
        coordinator.spawn(path);
        files.push(file_name);
    }

    Ok(UploadFilesResponse {
        message: "Files uploaded successfully and processing started".to_string(),
        files,
    })
}
