//! Ingestion coordinator
//!
//! Runs one file end to end:
//! 1. Register progress under the file's base name
//! 2. Size the worker pool from the file size
//! 3. Count pass, then record the total
//! 4. Stream pass feeding a bounded queue drained by the pool
//! 5. Join every task and finalize progress

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::config::IngestConfig;
use super::error::{IngestError, IngestResult};
use super::ledger::DedupLedger;
use super::source::CsvSource;
use super::store::StudentStore;
use super::worker::{PoolWorker, RunContext, WorkerReport};
use super::writer::BatchWriter;
use crate::progress::{ProgressTracker, RunKey};

/// Queue capacity for pools of up to [`WIDE_POOL_THRESHOLD`] workers.
pub const BASE_QUEUE_CAPACITY: usize = 1000;

/// Pools wider than this get `workers * QUEUE_SLOTS_PER_WORKER` slots.
pub const WIDE_POOL_THRESHOLD: usize = 10;

pub const QUEUE_SLOTS_PER_WORKER: usize = 100;

/// File size tiers (exclusive upper bound in bytes, worker cap)
const SIZE_TIERS: [(u64, usize); 4] = [
    (1_000_000, 2),
    (10_000_000, 4),
    (100_000_000, 8),
    (1_000_000_000, 16),
];

/// Pool size for a file of `file_size` bytes on `parallelism` CPUs.
///
/// Files of a gigabyte or more get one worker per CPU.
pub fn worker_count(file_size: u64, parallelism: usize) -> usize {
    let parallelism = parallelism.max(1);
    SIZE_TIERS
        .iter()
        .find(|(limit, _)| file_size < *limit)
        .map(|(_, cap)| (*cap).min(parallelism))
        .unwrap_or(parallelism)
}

pub fn queue_capacity(workers: usize) -> usize {
    if workers > WIDE_POOL_THRESHOLD {
        workers * QUEUE_SLOTS_PER_WORKER
    } else {
        BASE_QUEUE_CAPACITY
    }
}

/// Base name used as the progress key for `path`
pub fn progress_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub file_name: String,
    pub total_records: u64,
    pub workers: usize,
    /// Rows the reader could not decode
    pub unreadable: u64,
    pub rows: WorkerReport,
    pub failed_workers: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct ProducerReport {
    queued: u64,
    unreadable: u64,
}

/// Drives ingestion runs against one store.
///
/// All runs started through the same coordinator share its admission
/// semaphore, so the number of pool members running at once never exceeds
/// `max_concurrency` however many files are in flight.
pub struct IngestionCoordinator {
    tracker: Arc<ProgressTracker>,
    store: Arc<dyn StudentStore>,
    admission: Arc<Semaphore>,
    config: IngestConfig,
}

impl IngestionCoordinator {
    pub fn new(
        tracker: Arc<ProgressTracker>,
        store: Arc<dyn StudentStore>,
        config: IngestConfig,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            tracker,
            store,
            admission,
            config,
        }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Admission permits not currently held by a pool member
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// Run `path` in the background, logging a fatal error instead of
    /// returning it. Progress is still finalized either way.
    pub fn spawn(self: &Arc<Self>, path: PathBuf) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = coordinator.ingest(&path).await {
                error!(path = %path.display(), error = %e, "Ingestion failed");
            }
        })
    }

    /// Ingest one file.
    ///
    /// Fails only when the file cannot be opened or counted; the progress
    /// record is marked `error` in that case. Everything after that point is
    /// absorbed and the run ends `completed`.
    pub async fn ingest(&self, path: impl AsRef<Path>) -> IngestResult<IngestReport> {
        let path = path.as_ref();
        let file_name = progress_key(path);
        let started = Instant::now();

        let progress = self.tracker.create(&file_name);
        info!(
            file_name = %file_name,
            run_id = %progress.run_id(),
            path = %path.display(),
            "Starting ingestion"
        );

        match self.run(path, &progress, started).await {
            Ok(report) => {
                self.tracker.complete(&progress);
                info!(
                    file_name = %file_name,
                    total_records = report.total_records,
                    workers = report.workers,
                    accepted = report.rows.accepted,
                    duplicates = report.rows.duplicates,
                    invalid = report.rows.invalid + report.unreadable,
                    batches_dropped = report.rows.batches_dropped,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Ingestion completed"
                );
                Ok(report)
            }
            Err(e) => {
                self.tracker.fail(&progress, e.to_string());
                error!(file_name = %file_name, error = %e, "Ingestion aborted");
                Err(e)
            }
        }
    }

    async fn run(&self, path: &Path, progress: &RunKey, started: Instant) -> IngestResult<IngestReport> {
        let file_name = progress.file_name();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let workers = worker_count(metadata.len(), self.config.parallelism());
        let source = CsvSource::new(path);

        let total = source.count().await.map_err(IngestError::Count)?;
        self.tracker.set_total(progress, total);

        let rows = source.stream().await.map_err(IngestError::Stream)?;

        let capacity = queue_capacity(workers);
        debug!(
            file_name,
            file_size = metadata.len(),
            total_records = total,
            workers,
            queue_capacity = capacity,
            "Sized worker pool"
        );

        let (tx, rx) = mpsc::channel(capacity);
        let file_key: Arc<str> = Arc::from(file_name);
        let run = Arc::new(RunContext {
            file_name: file_key.clone(),
            progress: progress.clone(),
            queue: Arc::new(Mutex::new(rx)),
            ledger: DedupLedger::new(),
            writer: BatchWriter::new(self.store.clone(), file_key.clone()),
            tracker: self.tracker.clone(),
            batch_size: self.config.batch_size,
            progress_interval: self.config.progress_interval,
        });

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let worker = PoolWorker::new(worker_id, run.clone());
            pool.spawn(worker.run(self.admission.clone()));
        }
        // Only pool members may keep the receiver alive, so the producer
        // notices when every member has exited.
        drop(run);

        let producer_key = file_key.clone();
        let producer = tokio::spawn(async move {
            let mut rows = std::pin::pin!(rows);
            let mut report = ProducerReport::default();

            while let Some(item) = rows.next().await {
                match item {
                    Ok(row) => {
                        if tx.send(row).await.is_err() {
                            warn!(file_name = %producer_key, "Row queue closed before the file was exhausted");
                            break;
                        }
                        report.queued += 1;
                    }
                    Err(e) => {
                        report.unreadable += 1;
                        warn!(file_name = %producer_key, error = %e, "Skipping unreadable row");
                    }
                }
            }

            report
        });

        let mut rows_report = WorkerReport::default();
        let mut failed_workers = 0;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(report)) => rows_report.merge(&report),
                Ok(Err(e)) => {
                    failed_workers += 1;
                    error!(file_name, error = %e, "Worker failed");
                }
                Err(e) if e.is_panic() => {
                    failed_workers += 1;
                    error!(file_name, error = %e, "Worker panicked");
                }
                Err(e) => {
                    failed_workers += 1;
                    warn!(file_name, error = %e, "Worker cancelled");
                }
            }
        }

        let unreadable = match producer.await {
            Ok(report) => {
                debug!(file_name, queued = report.queued, "Producer finished");
                report.unreadable
            }
            Err(e) => {
                error!(file_name, error = %e, "Producer task failed");
                0
            }
        };

        Ok(IngestReport {
            file_name: file_name.to_string(),
            total_records: total,
            workers,
            unreadable,
            rows: rows_report,
            failed_workers,
            elapsed: started.elapsed(),
        })
    }
}
