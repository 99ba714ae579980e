//! Batch writer shared by every pool member of a run

use std::sync::Arc;
use tracing::{debug, error};

use super::store::StudentStore;
use crate::models::Student;

/// Outcome of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Batch persisted; carries the number of rows actually inserted
    Written(u64),
    /// Store rejected the batch; its rows are dropped from the run's output
    Dropped,
    /// Nothing to write
    Empty,
}

/// Flushes worker-local batches to the store as single bulk upserts.
///
/// Cheap to clone; each flush is an independent unit of work, so pool members
/// flush concurrently without coordinating. Store failures are logged here and
/// never reach the coordinator.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn StudentStore>,
    file_name: Arc<str>,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn StudentStore>, file_name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            file_name: file_name.into(),
        }
    }

    pub async fn flush(&self, batch: &[Student]) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        match self.store.insert_ignore(batch).await {
            Ok(inserted) => {
                debug!(
                    file_name = %self.file_name,
                    batch_size = batch.len(),
                    inserted,
                    "Flushed student batch"
                );
                FlushOutcome::Written(inserted)
            }
            Err(e) => {
                error!(
                    file_name = %self.file_name,
                    batch_size = batch.len(),
                    error = %e,
                    "Failed to flush student batch, dropping it"
                );
                FlushOutcome::Dropped
            }
        }
    }
}
