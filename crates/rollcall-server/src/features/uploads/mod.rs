//! Uploads feature module
//!
//! Accepts student files over multipart and hands each one to the ingestion
//! pipeline.

pub mod commands;
pub mod routes;

pub use routes::uploads_routes;
