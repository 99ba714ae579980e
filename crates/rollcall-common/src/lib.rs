//! Rollcall Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Rollcall workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`RollcallError`] and the crate-wide [`Result`] alias
//! - **Logging**: environment-driven `tracing` setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use rollcall_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{Result, RollcallError};
