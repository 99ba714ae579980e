//! Feature modules implementing the Rollcall HTTP API
//!
//! Each feature is a vertical slice with its own commands or queries and a
//! `routes.rs`:
//!
//! - **uploads**: multipart upload that starts ingestion runs
//! - **progress**: per-file progress by polling or server-sent events
//! - **students**: paginated listing of ingested students

pub mod progress;
pub mod shared;
pub mod students;
pub mod uploads;

use axum::Router;
use std::sync::Arc;

use crate::ingest::IngestionCoordinator;
use crate::progress::ProgressTracker;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for the students listing
    pub db: sqlx::PgPool,
    /// Pipeline entry point for uploaded files
    pub coordinator: Arc<IngestionCoordinator>,
}

impl FeatureState {
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        self.coordinator.tracker().clone()
    }
}

/// Creates the router with all feature routes merged at the root
pub fn router(state: FeatureState) -> Router<()> {
    let max_upload_bytes = state.coordinator.config().max_upload_bytes;

    Router::new()
        .merge(uploads::uploads_routes(max_upload_bytes).with_state(state.coordinator.clone()))
        .merge(progress::progress_routes().with_state(state.tracker()))
        .merge(students::students_routes().with_state(state.db.clone()))
}
