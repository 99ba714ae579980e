//! Upload commands

pub mod upload;

pub use upload::{sanitize_file_name, UploadError, UploadFilesResponse};
