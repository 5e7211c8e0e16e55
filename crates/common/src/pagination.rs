//! Bounded pagination for list operations.
//!
//! Every list operation in the persistence contracts takes a
//! [`PaginationParams`]; callers always provide a page size and the storage
//! layer never returns unbounded result sets.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Hard cap on the page size accepted from callers.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Pagination parameters for list operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page, clamped to [`MAX_PAGE_SIZE`]
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PaginationParams {
    /// Create pagination parameters, clamping to sane bounds.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Row offset for the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Row limit for the current page.
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A page of results together with the total count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
    /// Total items across all pages
    pub total: u64,
}

impl<T> PaginatedResult<T> {
    /// Assemble a page of results.
    pub fn new(items: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        Self {
            items,
            page: params.page,
            per_page: params.per_page,
            total,
        }
    }

    /// Total number of pages.
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total + u64::from(self.per_page) - 1) / u64::from(self.per_page)) as u32
    }

    /// Whether a later page exists.
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Map items while keeping the page shape.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let params = PaginationParams::new(1, 20);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 20);

        let params = PaginationParams::new(3, 10);
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_clamping() {
        let params = PaginationParams::new(0, 10_000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_paginated_result() {
        let params = PaginationParams::new(1, 10);
        let result = PaginatedResult::new(vec![1, 2, 3], &params, 25);

        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next_page());

        let mapped = result.map(|x| x * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
    }
}
