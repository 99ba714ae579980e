//! Progress routes
//!
//! Polling endpoints plus a server-sent event stream of every snapshot the
//! tracker broadcasts.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use std::sync::Arc;

use super::queries::{self, GetProgressError, GetProgressQuery};
use crate::error::AppError;
use crate::progress::{ProgressRecord, ProgressTracker};

impl From<GetProgressError> for AppError {
    fn from(err: GetProgressError) -> Self {
        match err {
            GetProgressError::FileNameRequired => AppError::BadRequest(err.to_string()),
            GetProgressError::NotFound(_) => AppError::NotFound(err.to_string()),
        }
    }
}

/// Create progress routes
pub fn progress_routes() -> Router<Arc<ProgressTracker>> {
    Router::new()
        .route("/progress", get(get_progress))
        .route("/progress/all", get(get_all_progress))
        .route("/progress/sse", get(progress_events))
}

/// Progress of one file
///
/// GET /progress?fileName=grades.csv
async fn get_progress(
    State(tracker): State<Arc<ProgressTracker>>,
    Query(query): Query<GetProgressQuery>,
) -> Result<Json<ProgressRecord>, AppError> {
    Ok(Json(queries::handle(&tracker, query)?))
}

/// Progress of every tracked file
///
/// GET /progress/all
async fn get_all_progress(State(tracker): State<Arc<ProgressTracker>>) -> Json<Vec<ProgressRecord>> {
    Json(queries::handle_all(&tracker))
}

/// Live progress stream
///
/// GET /progress/sse
///
/// Each broadcast snapshot becomes one `data:` event carrying its JSON. The
/// subscription is dropped, and so removed from the broadcaster, when the
/// client disconnects.
async fn progress_events(
    State(tracker): State<Arc<ProgressTracker>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = tracker.broadcaster().subscribe_stream();
    tracing::debug!(subscriber_id = %subscription.id(), "Progress stream opened");

    let events = subscription.map(|record| Event::default().json_data(record));

    Sse::new(events).keep_alive(KeepAlive::default())
}
