//! Progress feature module
//!
//! Read-only access to live ingestion progress, by polling or over SSE.

pub mod queries;
pub mod routes;

pub use routes::progress_routes;
