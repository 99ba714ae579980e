//! Upload routes

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use super::commands::{upload::handle as handle_upload, UploadError, UploadFilesResponse};
use crate::error::AppError;
use crate::ingest::IngestionCoordinator;
use crate::middleware::upload_limit_layers;

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoFiles
            | UploadError::InvalidFileName(_)
            | UploadError::DuplicateFileName(_) => AppError::BadRequest(err.to_string()),
            UploadError::StillProcessing(_) => AppError::Conflict(err.to_string()),
            UploadError::Multipart(e) => AppError::Multipart(e),
            UploadError::Io(e) => AppError::Io(e),
        }
    }
}

/// Create upload routes accepting bodies up to `max_upload_bytes`
pub fn uploads_routes(max_upload_bytes: usize) -> Router<Arc<IngestionCoordinator>> {
    let (extractor_limit, body_limit) = upload_limit_layers(max_upload_bytes);

    Router::new()
        .route("/upload", post(upload_files))
        .layer(extractor_limit)
        .layer(body_limit)
}

/// Upload one or more files for ingestion
///
/// POST /upload (multipart, repeated `files` parts)
async fn upload_files(
    State(coordinator): State<Arc<IngestionCoordinator>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadFilesResponse>), AppError> {
    let response = handle_upload(coordinator, multipart).await?;

    tracing::info!(files = ?response.files, "Ingestion started for uploaded files");

    Ok((StatusCode::ACCEPTED, Json(response)))
}
