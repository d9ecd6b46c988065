//! List query composition.
//!
//! Callers hand over loosely-typed [`ListCriteria`]; [`compose`] validates
//! them into a [`ListQuery`] that storage backends execute as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QueryLimits;

/// Result type for query composition.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while composing a list query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid range: start_time {start} is after end_time {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid pagination: {field} must be at least 1")]
    InvalidPagination { field: &'static str },
}

/// Caller-supplied list criteria. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListCriteria {
    pub project_id: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Validated filter predicates. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub project_id: Option<i64>,
    /// Inclusive lower bound on `timestamp`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`.
    pub end: Option<DateTime<Utc>>,
    /// Substring of `searchable_strings`.
    pub search: Option<String>,
}

impl EventFilter {
    /// Evaluate the filter against a single record's fields.
    pub fn matches(
        &self,
        project_id: i64,
        timestamp: &DateTime<Utc>,
        searchable_strings: &str,
    ) -> bool {
        self.project_id.map_or(true, |p| p == project_id)
            && self.start.map_or(true, |s| *timestamp >= s)
            && self.end.map_or(true, |e| *timestamp <= e)
            && self
                .search
                .as_deref()
                .map_or(true, |term| searchable_strings.contains(term))
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// A composed list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: EventFilter,
    pub page: PageRequest,
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

/// Validate criteria and build a list query.
///
/// The time range is checked before anything else so an inverted range is
/// reported regardless of the other criteria.
pub fn compose(criteria: ListCriteria, limits: &QueryLimits) -> Result<ListQuery> {
    if let (Some(start), Some(end)) = (criteria.start_time, criteria.end_time) {
        if start > end {
            return Err(QueryError::InvalidRange { start, end });
        }
    }

    let page = criteria.page.unwrap_or(1);
    if page == 0 {
        return Err(QueryError::InvalidPagination { field: "page" });
    }

    let page_size = criteria.page_size.unwrap_or(limits.default_page_size);
    if page_size == 0 {
        return Err(QueryError::InvalidPagination { field: "page_size" });
    }
    let page_size = page_size.min(limits.max_page_size);

    let search = criteria
        .search
        .filter(|term| !term.trim().is_empty());

    Ok(ListQuery {
        filter: EventFilter {
            project_id: criteria.project_id,
            start: criteria.start_time,
            end: criteria.end_time,
            search,
        },
        page: PageRequest { page, page_size },
    })
}
