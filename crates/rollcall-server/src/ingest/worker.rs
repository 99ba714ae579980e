//! Pool member draining the shared row queue
//!
//! Each member holds one admission permit for its whole life, turns rows into
//! [`Student`]s, claims their identifiers in the run's ledger and flushes its
//! own batch through the shared [`BatchWriter`].

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, trace};

use super::error::{IngestError, IngestResult};
use super::ledger::DedupLedger;
use super::source::RawRow;
use super::writer::{BatchWriter, FlushOutcome};
use crate::models::Student;
use crate::progress::{ProgressTracker, RunKey};

/// Fields a row needs: id, name, subject, grade
pub const STUDENT_FIELDS: usize = 4;

/// Receiving end of a run's queue, shared by every member
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<RawRow>>>;

/// State shared by all pool members of one run
pub struct RunContext {
    pub file_name: Arc<str>,
    /// Ownership of this run's progress record
    pub progress: RunKey,
    pub queue: SharedQueue,
    pub ledger: DedupLedger,
    pub writer: BatchWriter,
    pub tracker: Arc<ProgressTracker>,
    pub batch_size: usize,
    pub progress_interval: usize,
}

/// Per-member tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub accepted: u64,
    pub duplicates: u64,
    pub invalid: u64,
    pub batches_written: u64,
    pub batches_dropped: u64,
    pub rows_inserted: u64,
}

impl WorkerReport {
    pub fn merge(&mut self, other: &WorkerReport) {
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.invalid += other.invalid;
        self.batches_written += other.batches_written;
        self.batches_dropped += other.batches_dropped;
        self.rows_inserted += other.rows_inserted;
    }
}

/// What happened to one row
#[derive(Debug)]
enum RowOutcome {
    Accepted(Student),
    Duplicate,
    Invalid(IngestError),
}

/// Build a [`Student`] from a raw row.
///
/// The grade is trimmed before parsing; extra trailing fields are ignored.
pub fn parse_student(row: &RawRow) -> IngestResult<Student> {
    if row.len() < STUDENT_FIELDS {
        return Err(IngestError::InvalidRow(format!(
            "expected {} fields, found {}",
            STUDENT_FIELDS,
            row.len()
        )));
    }

    let raw_grade = &row.fields[3];
    let grade = raw_grade
        .trim()
        .parse::<i32>()
        .map_err(|e| IngestError::InvalidRow(format!("grade {:?} is not an integer: {}", raw_grade, e)))?;

    Ok(Student::new(
        row.fields[0].as_str(),
        row.fields[1].as_str(),
        row.fields[2].as_str(),
        grade,
    ))
}

/// One member of a run's worker pool
pub struct PoolWorker {
    worker_id: usize,
    run: Arc<RunContext>,
}

impl PoolWorker {
    pub fn new(worker_id: usize, run: Arc<RunContext>) -> Self {
        Self { worker_id, run }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Drain the queue until it is closed and empty.
    ///
    /// Waits for an admission permit first; the permit is released when this
    /// returns. Only a closed semaphore makes this fail.
    pub async fn run(self, admission: Arc<Semaphore>) -> IngestResult<WorkerReport> {
        let _permit = admission.acquire_owned().await?;
        let run = &self.run;

        debug!(
            file_name = %run.file_name,
            worker_id = self.worker_id,
            "Worker admitted"
        );

        let mut report = WorkerReport::default();
        let mut batch: Vec<Student> = Vec::with_capacity(run.batch_size);
        let mut unreported: u64 = 0;
        let interval = run.progress_interval as u64;

        while let Some(row) = self.next_row().await {
            match self.classify(&row) {
                RowOutcome::Accepted(student) => {
                    batch.push(student);
                    report.accepted += 1;
                    unreported += 1;

                    if unreported >= interval {
                        run.tracker.increment(&run.progress, unreported);
                        unreported = 0;
                    }

                    if batch.len() >= run.batch_size {
                        self.flush(&mut batch, &mut report).await;
                    }
                }
                RowOutcome::Duplicate => {
                    report.duplicates += 1;
                    trace!(
                        file_name = %run.file_name,
                        student_id = row.field(0).unwrap_or_default(),
                        "Skipping duplicate student"
                    );
                }
                RowOutcome::Invalid(e) => {
                    report.invalid += 1;
                    debug!(
                        file_name = %run.file_name,
                        line = row.line,
                        error = %e,
                        "Skipping invalid row"
                    );
                }
            }
        }

        self.flush(&mut batch, &mut report).await;

        if unreported > 0 {
            run.tracker.increment(&run.progress, unreported);
        }

        debug!(
            file_name = %run.file_name,
            worker_id = self.worker_id,
            accepted = report.accepted,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "Worker finished"
        );

        Ok(report)
    }

    async fn next_row(&self) -> Option<RawRow> {
        self.run.queue.lock().await.recv().await
    }

    /// Invalid rows never claim an identifier, so a later valid row with the
    /// same id is still accepted.
    fn classify(&self, row: &RawRow) -> RowOutcome {
        let ledger = &self.run.ledger;

        if row.len() >= STUDENT_FIELDS && ledger.contains(&row.fields[0]) {
            return RowOutcome::Duplicate;
        }

        let student = match parse_student(row) {
            Ok(student) => student,
            Err(e) => return RowOutcome::Invalid(e),
        };

        if ledger.try_claim(&student.student_id) {
            RowOutcome::Accepted(student)
        } else {
            RowOutcome::Duplicate
        }
    }

    async fn flush(&self, batch: &mut Vec<Student>, report: &mut WorkerReport) {
        match self.run.writer.flush(batch).await {
            FlushOutcome::Written(inserted) => {
                report.batches_written += 1;
                report.rows_inserted += inserted;
            }
            FlushOutcome::Dropped => report.batches_dropped += 1,
            FlushOutcome::Empty => {}
        }
        batch.clear();
    }
}
