//! Progress snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one file's ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProgressStatus::Processing => "processing",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
        }
    }

    /// `Completed` and `Error` are final; nothing moves a record out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Processing)
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one file, as handed to readers and subscribers.
///
/// Always a copy: the tracker never lends out the record it mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProgressRecord {
    pub file_name: String,
    pub total_records: u64,
    pub processed: u64,
    pub status: ProgressStatus,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            total_records: 0,
            processed: 0,
            status: ProgressStatus::Processing,
            error_message: None,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Completion percentage in `0.0..=100.0`
    pub fn percentage(&self) -> f64 {
        if self.total_records == 0 {
            return if self.status == ProgressStatus::Completed { 100.0 } else { 0.0 };
        }
        (self.processed as f64 / self.total_records as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_processing() {
        let record = ProgressRecord::new("grades.csv");
        assert_eq!(record.status, ProgressStatus::Processing);
        assert_eq!(record.total_records, 0);
        assert_eq!(record.processed, 0);
        assert!(record.end_time.is_none());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ProgressStatus::Processing.is_terminal());
        assert!(ProgressStatus::Completed.is_terminal());
        assert!(ProgressStatus::Error.is_terminal());
    }

    #[test]
    fn test_serializes_with_client_field_names() {
        let mut record = ProgressRecord::new("grades.csv");
        record.total_records = 10;
        record.processed = 4;

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["FileName"], "grades.csv");
        assert_eq!(json["TotalRecords"], 10);
        assert_eq!(json["Processed"], 4);
        assert_eq!(json["Status"], "processing");
        assert!(json.get("Error").is_none());
        assert!(json["EndTime"].is_null());
    }

    #[test]
    fn test_percentage() {
        let mut record = ProgressRecord::new("grades.csv");
        assert_eq!(record.percentage(), 0.0);

        record.total_records = 200;
        record.processed = 50;
        assert_eq!(record.percentage(), 25.0);

        record.total_records = 0;
        record.status = ProgressStatus::Completed;
        assert_eq!(record.percentage(), 100.0);
    }
}
