//! Limits for list queries.

use serde::Deserialize;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a caller may request. Larger requests are clamped.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Pagination limits applied by the query composer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Page size used when none is given.
    ///
    /// Default: 10.
    pub default_page_size: u32,

    /// Upper bound on page size. Prevents unbounded result sets.
    ///
    /// Default: 100.
    pub max_page_size: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}
