//! Shared pagination utilities
//!
//! ```rust,ignore
//! use rollcall_server::features::shared::pagination::{Page, PaginationParams};
//!
//! let params = PaginationParams::new(Some(2), Some(20));
//! let offset = params.offset();
//!
//! // After fetching rows...
//! let page = Page::new(rows, &params, 100);
//! ```

use serde::{Deserialize, Serialize};

/// Items per page when the client does not ask for a size.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page a client may request.
pub const MAX_LIMIT: i64 = 1000;

/// Common pagination request parameters (`page` is 1-indexed)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PaginationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    /// Page number, defaulting to 1; values below 1 are treated as 1
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Items per page, defaulting to 10; values below 1 fall back to the
    /// default and large values are capped at [`MAX_LIMIT`]
    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit >= 1 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }

    /// Calculate the offset for SQL OFFSET clause, saturating at `i64::MAX`
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Number of pages needed for `total` items at `limit` per page
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total - 1) / limit + 1
}

/// One page of results in the listing envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        let limit = params.limit();
        Self {
            data,
            page: params.page(),
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }
}
