//! Rollcall Server Library
//!
//! Loads student grade files into PostgreSQL and reports live progress.
//!
//! # Overview
//!
//! - **Ingestion**: a bounded, size-tiered worker pool per uploaded file with
//!   run-scoped deduplication and bulk insert-or-ignore writes
//! - **Progress**: per-file progress records, pushed to subscribers as they change
//! - **API**: upload, progress polling, server-sent events and student listing
//!
//! # Example
//!
//! ```no_run
//! use rollcall_server::{ingest::{IngestConfig, IngestionCoordinator, MemoryStudentStore},
//!     progress::{ProgressBroadcaster, ProgressTracker}};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBroadcaster::default())));
//!     let store = Arc::new(MemoryStudentStore::new());
//!     let coordinator = IngestionCoordinator::new(tracker, store, IngestConfig::default());
//!     let report = coordinator.ingest("uploads/grades.csv").await?;
//!     println!("{} rows", report.total_records);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod progress;

pub use error::{AppError, AppResult};
