//! Offset pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// A requested page, as parsed from `?page=&per_page=`.
///
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "PageRequest::default_page")]
    page: u32,
    #[serde(default = "PageRequest::default_per_page")]
    per_page: u32,
}

impl PageRequest {
    /// Default number of items per page.
    pub const DEFAULT_PER_PAGE: u32 = 24;
    /// Largest allowed page size.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Create a page request, clamping `page >= 1` and `1 <= per_page <= 100`.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    const fn default_page() -> u32 {
        1
    }

    const fn default_per_page() -> u32 {
        Self::DEFAULT_PER_PAGE
    }

    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Items per page.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    /// Assemble a page from the rows of `request` and the unpaged row count.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let per_page = request.limit();
        let total = total.max(0);
        Self {
            items,
            page: request.page(),
            per_page: request.per_page(),
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}
