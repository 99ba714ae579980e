//! Per-file progress state
//!
//! Every mutation goes through [`ProgressTracker::update`], which applies the
//! change under the write lock and publishes the resulting snapshot before the
//! lock is released. Subscribers therefore see snapshots of one file in the
//! order the mutations happened.
//!
//! A record belongs to the run that created it. Mutations carry the
//! [`RunKey`] returned by [`ProgressTracker::create`], and a key from an
//! earlier run of the same file name no longer matches once a newer run has
//! registered.

use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::broadcaster::ProgressBroadcaster;
use super::types::{ProgressRecord, ProgressStatus};

/// Handle one run uses to update its own progress record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    file_name: Arc<str>,
    run_id: Uuid,
}

impl RunKey {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

#[derive(Debug)]
struct TrackedRun {
    run_id: Uuid,
    record: ProgressRecord,
}

/// Shared map of file name to progress record
#[derive(Debug)]
pub struct ProgressTracker {
    records: RwLock<HashMap<String, TrackedRun>>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl ProgressTracker {
    pub fn new(broadcaster: Arc<ProgressBroadcaster>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    /// Register a fresh `processing` record, replacing any earlier one for the
    /// same name, and hand back the key that owns it.
    pub fn create(&self, file_name: &str) -> RunKey {
        let key = RunKey {
            file_name: Arc::from(file_name),
            run_id: Uuid::new_v4(),
        };
        let record = ProgressRecord::new(file_name);
        let mut records = self.write();

        if let Some(previous) = records.get(file_name) {
            if previous.record.status == ProgressStatus::Processing {
                warn!(
                    file_name,
                    superseded_run = %previous.run_id,
                    "Replacing progress record of a run still in flight"
                );
            }
        }

        self.broadcaster.publish(&record);
        records.insert(
            file_name.to_string(),
            TrackedRun {
                run_id: key.run_id,
                record,
            },
        );
        debug!(file_name, run_id = %key.run_id, "Progress record created");
        key
    }

    /// Whether `file_name` has a run that has not finished yet
    pub fn is_processing(&self, file_name: &str) -> bool {
        self.read()
            .get(file_name)
            .is_some_and(|tracked| tracked.record.status == ProgressStatus::Processing)
    }

    /// Record the row count from the counting pass
    pub fn set_total(&self, key: &RunKey, total: u64) -> Option<ProgressRecord> {
        self.update(key, |record| {
            record.total_records = total;
            record.processed = record.processed.min(total);
        })
    }

    /// Add `delta` processed rows, never past the total
    pub fn increment(&self, key: &RunKey, delta: u64) -> Option<ProgressRecord> {
        self.update(key, |record| {
            record.processed = record
                .processed
                .saturating_add(delta)
                .min(record.total_records);
        })
    }

    pub fn fail(&self, key: &RunKey, message: impl Into<String>) -> Option<ProgressRecord> {
        let message = message.into();
        self.update(key, |record| {
            record.status = ProgressStatus::Error;
            record.error_message = Some(message);
            record.end_time = Some(Utc::now());
        })
    }

    pub fn complete(&self, key: &RunKey) -> Option<ProgressRecord> {
        self.update(key, |record| {
            record.status = ProgressStatus::Completed;
            record.processed = record.total_records;
            record.end_time = Some(Utc::now());
        })
    }

    pub fn get(&self, file_name: &str) -> Option<ProgressRecord> {
        self.read().get(file_name).map(|tracked| tracked.record.clone())
    }

    /// Copies of every record, in no particular order
    pub fn get_all(&self) -> Vec<ProgressRecord> {
        self.read()
            .values()
            .map(|tracked| tracked.record.clone())
            .collect()
    }

    /// Apply `mutate` to the `processing` record owned by `key` and broadcast
    /// the result.
    ///
    /// Returns `None` when the file is unknown, already terminal, or owned by a
    /// newer run; nothing is published in that case.
    fn update<F>(&self, key: &RunKey, mutate: F) -> Option<ProgressRecord>
    where
        F: FnOnce(&mut ProgressRecord),
    {
        let file_name = key.file_name();
        let mut records = self.write();
        let tracked = records.get_mut(file_name)?;

        if tracked.run_id != key.run_id {
            debug!(
                file_name,
                run_id = %key.run_id,
                current_run = %tracked.run_id,
                "Ignoring update from a superseded run"
            );
            return None;
        }

        if tracked.record.status.is_terminal() {
            debug!(
                file_name,
                status = %tracked.record.status,
                "Ignoring update to finished progress record"
            );
            return None;
        }

        mutate(&mut tracked.record);
        let snapshot = tracked.record.clone();
        self.broadcaster.publish(&snapshot);
        Some(snapshot)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TrackedRun>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TrackedRun>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
