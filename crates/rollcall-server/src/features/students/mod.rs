//! Students feature module
//!
//! Read-only listing of ingested students.

pub mod queries;
pub mod routes;

pub use routes::students_routes;
