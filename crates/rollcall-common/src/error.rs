//! Error types shared across Rollcall crates

use thiserror::Error;

/// Result type alias for Rollcall operations
pub type Result<T> = std::result::Result<T, RollcallError>;

/// Main error type for Rollcall
#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delimited input error: {0}")]
    Csv(#[from] csv_async::Error),
}

impl RollcallError {
    /// Whether the error came from the underlying reader rather than the record layout.
    ///
    /// Delimited-input readers cannot make progress after an IO failure, so
    /// streaming consumers stop instead of skipping.
    pub fn is_io(&self) -> bool {
        match self {
            RollcallError::Io(_) => true,
            RollcallError::Csv(e) => matches!(e.kind(), csv_async::ErrorKind::Io(_)),
        }
    }
}
