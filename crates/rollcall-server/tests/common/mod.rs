//! Shared fixtures for integration tests

#![allow(dead_code)]

use rollcall_server::{
    db,
    ingest::{IngestConfig, IngestionCoordinator, MemoryStudentStore, StudentStore},
    progress::{ProgressBroadcaster, ProgressTracker},
};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

pub const HEADER: &str = "student_id,student_name,subject,grade";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rollcall_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Write `rows` under a header into `dir/name`
pub fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }

    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Write `count` valid rows with ids `S00000..`
pub fn write_generated_csv(dir: &Path, name: &str, count: usize) -> PathBuf {
    let rows: Vec<String> = (0..count)
        .map(|i| format!("S{:05},Student {},Subject {},{}", i, i, i % 7, i % 101))
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_csv(dir, name, &refs)
}

pub fn test_config(upload_dir: &Path) -> IngestConfig {
    IngestConfig {
        upload_dir: upload_dir.to_path_buf(),
        max_concurrency: 8,
        parallelism: Some(4),
        ..IngestConfig::default()
    }
}

pub struct Pipeline {
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub tracker: Arc<ProgressTracker>,
    pub coordinator: Arc<IngestionCoordinator>,
}

pub fn pipeline_with_store(store: Arc<dyn StudentStore>, config: IngestConfig) -> Pipeline {
    let broadcaster = Arc::new(ProgressBroadcaster::new(4096));
    let tracker = Arc::new(ProgressTracker::new(broadcaster.clone()));
    let coordinator = Arc::new(IngestionCoordinator::new(tracker.clone(), store, config));
    Pipeline {
        broadcaster,
        tracker,
        coordinator,
    }
}

pub fn memory_pipeline(upload_dir: &Path) -> (Pipeline, Arc<MemoryStudentStore>) {
    let store = Arc::new(MemoryStudentStore::new());
    let pipeline = pipeline_with_store(store.clone(), test_config(upload_dir));
    (pipeline, store)
}

/// PostgreSQL container with migrations applied
///
/// The container stops when this value is dropped.
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        let pool = db::create_pool(&db::DbConfig::for_url(url))
            .await
            .context("Failed to connect to PostgreSQL")?;

        db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
