//! Database models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A student grade row, keyed on `student_id`
///
/// Serialized with the field names upload clients already consume
/// (`StudentID`, `StudentName`, `Subject`, `Grade`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Student {
    #[serde(rename = "StudentID")]
    pub student_id: String,
    #[serde(rename = "StudentName")]
    pub student_name: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Grade")]
    pub grade: i32,
}

impl Student {
    pub fn new(
        student_id: impl Into<String>,
        student_name: impl Into<String>,
        subject: impl Into<String>,
        grade: i32,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
            subject: subject.into(),
            grade,
        }
    }
}
