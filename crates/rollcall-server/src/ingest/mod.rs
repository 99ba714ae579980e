//! Concurrent student-file ingestion
//!
//! A run reads its file twice through [`CsvSource`]: once to count rows and
//! once to stream them into a bounded queue. A pool of [`PoolWorker`]s drains
//! the queue, deduplicates through a run-scoped [`DedupLedger`] and writes in
//! bulk through [`BatchWriter`]. [`IngestionCoordinator`] wires it together
//! and keeps the [`ProgressTracker`](crate::progress::ProgressTracker) current.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod source;
pub mod store;
pub mod worker;
pub mod writer;

pub use config::IngestConfig;
pub use coordinator::{queue_capacity, worker_count, IngestReport, IngestionCoordinator};
pub use error::{IngestError, IngestResult, StoreError};
pub use ledger::DedupLedger;
pub use source::{CsvSource, RawRow};
pub use store::{MemoryStudentStore, PgStudentStore, StudentStore};
pub use worker::{parse_student, PoolWorker, WorkerReport};
pub use writer::{BatchWriter, FlushOutcome};
