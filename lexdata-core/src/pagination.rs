//! Offset pagination for list reads.

use serde::{Deserialize, Serialize};

/// Page size used when none is requested.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page size honoured.
pub const MAX_LIMIT: u32 = 1000;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: u32,
    /// Rows per page.
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Request a page. Out-of-range values are clamped.
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }.normalized()
    }

    /// Clamp page to at least 1 and limit into `1..=MAX_LIMIT`.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        let p = self.normalized();
        u64::from(p.page - 1) * u64::from(p.limit)
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    /// This page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Number of pages.
    pub total_pages: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// Assemble a page.
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let p = pagination.normalized();
        let total_pages = total.div_ceil(u64::from(p.limit));
        Self {
            items,
            total,
            page: p.page,
            limit: p.limit,
            total_pages,
            has_next: u64::from(p.page) < total_pages,
            has_prev: p.page > 1,
        }
    }

    /// Transform the items, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::default().offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
        assert_eq!(Pagination::new(0, 0), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::new(1, 10_000).limit, MAX_LIMIT);
    }

    #[test]
    fn test_page_metadata() {
        let page = Page::new(vec![1, 2], 101, Pagination::new(2, 50));
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = Page::new(vec![1], 101, Pagination::new(3, 50));
        assert!(!last.has_next);

        let empty: Page<i32> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn test_serializes_camel_case() {
        let page = Page::new(vec!["a"], 1, Pagination::default());
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["hasNext"], false);
    }
}
