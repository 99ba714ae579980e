//! Student queries

pub mod list_students;

pub use list_students::{ListStudentsError, ListStudentsQuery, SortField, SortOrder, StudentListing};
