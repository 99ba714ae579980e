//! End-to-end ingestion runs against the in-memory store

mod common;

use async_trait::async_trait;
use common::{init_tracing, memory_pipeline, pipeline_with_store, test_config, write_csv, write_generated_csv};
use rollcall_server::{
    ingest::{IngestError, IngestionCoordinator, MemoryStudentStore, StoreError, StudentStore},
    models::Student,
    progress::{ProgressBroadcaster, ProgressStatus, ProgressTracker},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

#[tokio::test]
async fn test_three_valid_rows() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        dir.path(),
        "three.csv",
        &["S001,Ada,Math,90", "S002,Alan,CS,85", "S003,Grace,Physics,77"],
    );
    let (pipeline, store) = memory_pipeline(dir.path());

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert_eq!(report.total_records, 3);
    assert_eq!(report.rows.accepted, 3);

    let record = pipeline.tracker.get("three.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.total_records, 3);
    assert_eq!(record.processed, 3);
    assert!(record.end_time.is_some());
    assert!(record.error_message.is_none());

    assert_eq!(store.len(), 3);
    assert_eq!(store.get("S003").unwrap(), Student::new("S003", "Grace", "Physics", 77));
}

#[tokio::test]
async fn test_duplicates_and_bad_grades_are_skipped() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        dir.path(),
        "mixed.csv",
        &["S001,Ada,Math,90", "S001,Ada,Math,90", "S002,Alan,CS,bad-grade"],
    );
    let (pipeline, store) = memory_pipeline(dir.path());

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert_eq!(report.rows.accepted, 1);
    assert_eq!(report.rows.duplicates, 1);
    assert_eq!(report.rows.invalid, 1);

    let record = pipeline.tracker.get("mixed.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.total_records, 3);
    assert_eq!(record.processed, 3);

    assert_eq!(store.len(), 1);
    assert!(store.get("S001").is_some());
    assert!(store.get("S002").is_none());
}

#[tokio::test]
async fn test_missing_file_fails_the_run() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (pipeline, store) = memory_pipeline(dir.path());

    let err = pipeline
        .coordinator
        .ingest(dir.path().join("missing.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Open { .. }));

    let record = pipeline.tracker.get("missing.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Error);
    assert!(!record.error_message.unwrap_or_default().is_empty());
    assert!(record.end_time.is_some());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_header_only_file_completes_empty() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "empty.csv", &[]);
    let (pipeline, store) = memory_pipeline(dir.path());

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert_eq!(report.total_records, 0);
    let record = pipeline.tracker.get("empty.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.processed, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_malformed_lines_do_not_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        dir.path(),
        "ragged.csv",
        &["S001,Ada,Math,90", "S002,Alan", "S003,Grace,Physics,77,extra", "S004,Linus,OS,60"],
    );
    let (pipeline, store) = memory_pipeline(dir.path());

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert_eq!(report.total_records, 4);
    assert_eq!(report.unreadable, 2);
    assert_eq!(store.len(), 2);
    assert!(store.get("S004").is_some());

    let record = pipeline.tracker.get("ragged.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.processed, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_file_with_duplicates_across_workers() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    // 5000 unique ids, each appearing twice.
    let rows: Vec<String> = (0..10_000)
        .map(|i| format!("S{:05},Student,Math,{}", i % 5000, i % 100))
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let path = write_csv(dir.path(), "large.csv", &refs);

    let (pipeline, store) = memory_pipeline(dir.path());
    let mut sub = pipeline.broadcaster.subscribe();

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert_eq!(report.total_records, 10_000);
    assert_eq!(report.rows.accepted, 5000);
    assert_eq!(report.rows.duplicates, 5000);
    assert_eq!(report.failed_workers, 0);
    assert_eq!(store.len(), 5000);

    let record = pipeline.tracker.get("large.csv").unwrap();
    assert_eq!(record.processed, record.total_records);

    let mut last = 0;
    let mut saw_completed = false;
    while let Ok(snapshot) = sub.receiver.try_recv() {
        assert!(snapshot.processed >= last, "processed went backwards");
        assert!(snapshot.processed <= 10_000);
        last = snapshot.processed;
        saw_completed |= snapshot.status == ProgressStatus::Completed;
    }
    assert!(saw_completed);
    assert_eq!(last, 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_share_admission() {
    let dir = TempDir::new().unwrap();
    let first = write_generated_csv(dir.path(), "first.csv", 3000);
    let second = write_generated_csv(dir.path(), "second.csv", 2000);

    let (pipeline, store) = memory_pipeline(dir.path());
    let permits = pipeline.coordinator.available_permits();

    let (a, b) = tokio::join!(
        pipeline.coordinator.ingest(&first),
        pipeline.coordinator.ingest(&second),
    );
    a.unwrap();
    b.unwrap();

    // Both files use ids S00000.., so the second run's rows collide in the store.
    assert_eq!(store.len(), 3000);
    for name in ["first.csv", "second.csv"] {
        let record = pipeline.tracker.get(name).unwrap();
        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.processed, record.total_records);
    }
    assert_eq!(pipeline.coordinator.available_permits(), permits);
}

struct FailingStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl StudentStore for FailingStore {
    async fn insert_ignore(&self, _students: &[Student]) -> Result<u64, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("database is down".to_string()))
    }
}

#[tokio::test]
async fn test_flush_failures_still_complete() {
    let dir = TempDir::new().unwrap();
    let path = write_generated_csv(dir.path(), "unlucky.csv", 2500);

    let store = Arc::new(FailingStore {
        attempts: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with_store(store.clone(), test_config(dir.path()));

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert!(store.attempts.load(Ordering::SeqCst) >= 3);
    assert_eq!(report.rows.batches_written, 0);
    assert!(report.rows.batches_dropped >= 3);

    let record = pipeline.tracker.get("unlucky.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.processed, 2500);
}

struct PanickingStore;

#[async_trait]
impl StudentStore for PanickingStore {
    async fn insert_ignore(&self, _students: &[Student]) -> Result<u64, StoreError> {
        panic!("store exploded");
    }
}

#[tokio::test]
async fn test_worker_panic_is_contained() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "panic.csv", &["S001,Ada,Math,90", "S002,Alan,CS,85"]);

    let pipeline = pipeline_with_store(Arc::new(PanickingStore), test_config(dir.path()));

    let report = pipeline.coordinator.ingest(&path).await.unwrap();

    assert!(report.failed_workers >= 1);
    let record = pipeline.tracker.get("panic.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(pipeline.coordinator.available_permits(), 8);
}

#[tokio::test]
async fn test_reingesting_a_file_starts_a_fresh_record() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "again.csv", &["S001,Ada,Math,90"]);
    let (pipeline, store) = memory_pipeline(dir.path());

    pipeline.coordinator.ingest(&path).await.unwrap();
    let first = pipeline.tracker.get("again.csv").unwrap();

    let report = pipeline.coordinator.ingest(&path).await.unwrap();
    let second = pipeline.tracker.get("again.csv").unwrap();

    assert_eq!(report.rows.accepted, 1);
    assert_eq!(report.rows.rows_inserted, 0);
    assert_eq!(second.status, ProgressStatus::Completed);
    assert!(second.start_time >= first.start_time);
    assert_eq!(store.len(), 1);
}

/// Holds every write until the test opens the gate
struct GatedStore {
    entered: Notify,
    gate: Semaphore,
    inner: MemoryStudentStore,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            gate: Semaphore::new(0),
            inner: MemoryStudentStore::new(),
        }
    }

    fn open(&self) {
        self.gate.add_permits(64);
    }
}

#[async_trait]
impl StudentStore for GatedStore {
    async fn insert_ignore(&self, students: &[Student]) -> Result<u64, StoreError> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.inner.insert_ignore(students).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_earlier_run_cannot_finalize_a_newer_run_of_the_same_name() {
    init_tracing();
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first_path = write_csv(first_dir.path(), "students.csv", &["S001,Ada,Math,90", "S002,Alan,CS,85"]);
    let second_path = write_csv(
        second_dir.path(),
        "students.csv",
        &["S003,Grace,Physics,77", "S004,Linus,OS,60", "S005,Barbara,CS,99"],
    );

    let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBroadcaster::new(4096))));
    let first_store = Arc::new(GatedStore::new());
    let second_store = Arc::new(GatedStore::new());
    let first = Arc::new(IngestionCoordinator::new(
        tracker.clone(),
        first_store.clone(),
        test_config(first_dir.path()),
    ));
    let second = Arc::new(IngestionCoordinator::new(
        tracker.clone(),
        second_store.clone(),
        test_config(second_dir.path()),
    ));

    let first_run = {
        let first = first.clone();
        tokio::spawn(async move { first.ingest(&first_path).await })
    };
    tokio::time::timeout(Duration::from_secs(5), first_store.entered.notified())
        .await
        .unwrap();

    let second_run = {
        let second = second.clone();
        tokio::spawn(async move { second.ingest(&second_path).await })
    };
    tokio::time::timeout(Duration::from_secs(5), second_store.entered.notified())
        .await
        .unwrap();

    first_store.open();
    let first_report = tokio::time::timeout(Duration::from_secs(5), first_run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first_report.total_records, 2);

    let record = tracker.get("students.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Processing);
    assert_eq!(record.total_records, 3);
    assert!(record.end_time.is_none());

    second_store.open();
    tokio::time::timeout(Duration::from_secs(5), second_run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let record = tracker.get("students.csv").unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.processed, 3);
    assert_eq!(second_store.inner.len(), 3);
    assert_eq!(first_store.inner.len(), 2);
}
