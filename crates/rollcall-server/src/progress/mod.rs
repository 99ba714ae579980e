//! Live ingestion progress
//!
//! [`ProgressTracker`] owns one [`ProgressRecord`] per file and pushes a
//! snapshot through [`ProgressBroadcaster`] on every change.

pub mod broadcaster;
pub mod tracker;
pub mod types;

pub use broadcaster::{
    ProgressBroadcaster, ProgressStream, PublishReport, SubscriberId, Subscription,
    DEFAULT_SUBSCRIBER_BUFFER,
};
pub use tracker::{ProgressTracker, RunKey};
pub use types::{ProgressRecord, ProgressStatus};
