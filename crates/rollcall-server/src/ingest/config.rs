//! Ingestion configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default directory uploaded files are written to.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default number of rows a worker accumulates before flushing.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default number of accepted rows between progress increments.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Default per-subscriber snapshot buffer.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = crate::progress::DEFAULT_SUBSCRIBER_BUFFER;

/// Default maximum multipart upload size (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Number of CPUs visible to the process, at least 1
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Default process-wide cap on running pool members.
pub fn default_max_concurrency() -> usize {
    available_parallelism() * 2
}

/// Pipeline tuning shared by every run in the process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    pub upload_dir: PathBuf,
    /// Pool members allowed to run at once across all files
    pub max_concurrency: usize,
    pub batch_size: usize,
    pub progress_interval: usize,
    pub subscriber_buffer: usize,
    pub max_upload_bytes: usize,
    /// Parallelism used for worker sizing; `None` asks the OS
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_concurrency: default_max_concurrency(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            parallelism: None,
        }
    }
}

impl IngestConfig {
    /// Read `INGEST_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            upload_dir: std::env::var("INGEST_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_concurrency: env_parse("INGEST_MAX_CONCURRENCY")
                .unwrap_or_else(default_max_concurrency),
            batch_size: env_parse("INGEST_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE),
            progress_interval: env_parse("INGEST_PROGRESS_INTERVAL")
                .unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            subscriber_buffer: env_parse("INGEST_SUBSCRIBER_BUFFER")
                .unwrap_or(DEFAULT_SUBSCRIBER_BUFFER),
            max_upload_bytes: env_parse("INGEST_MAX_UPLOAD_BYTES")
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            parallelism: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrency == 0 {
            anyhow::bail!("Ingest max_concurrency must be greater than 0");
        }
        if self.batch_size == 0 {
            anyhow::bail!("Ingest batch_size must be greater than 0");
        }
        if self.progress_interval == 0 {
            anyhow::bail!("Ingest progress_interval must be greater than 0");
        }
        if self.subscriber_buffer == 0 {
            anyhow::bail!("Ingest subscriber_buffer must be greater than 0");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("Ingest max_upload_bytes must be greater than 0");
        }
        Ok(())
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(available_parallelism).max(1)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
