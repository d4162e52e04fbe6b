//! Shared pagination types for list endpoints.
//!
//! Concert and reservation listings use offset-based pagination with `skip` and `limit`.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Offset pagination parameters.
///
/// `limit` is clamped to 1..=100 and `skip` to >= 0, so a page query never returns zero rows by
/// construction and never fetches an unbounded amount.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 20, max: 100)
    #[param(default = 20, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// `(skip, limit)`, both clamped
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// A page of items plus the total count matching the query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let p = Pagination::default();
        assert_eq!(p.params(), (0, DEFAULT_LIMIT));
    }

    #[test]
    fn test_clamping() {
        let p = Pagination {
            skip: Some(-3),
            limit: Some(0),
        };
        assert_eq!(p.params(), (0, 1));

        let p = Pagination {
            skip: Some(40),
            limit: Some(5000),
        };
        assert_eq!(p.params(), (40, MAX_LIMIT));
    }

    #[test]
    fn test_query_string_numbers_parse() {
        let p: Pagination = serde_json::from_value(serde_json::json!({ "skip": "5", "limit": "7" })).unwrap();
        assert_eq!(p.params(), (5, 7));
    }
}
