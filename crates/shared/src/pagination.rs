//! Page-based pagination for admin listings.

use serde::{Deserialize, Serialize};

/// Default number of items per page.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Maximum number of items per page.
pub const MAX_PER_PAGE: u32 = 100;

/// Raw page parameters as received from a query string.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Page number, 1-based, never below 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        ((self.page() - 1) as i64) * self.per_page() as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page() as i64
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, params: &PageParams, total: i64) -> Self {
        Self {
            data,
            pagination: PageInfo {
                page: params.page(),
                per_page: params.per_page(),
                total,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let params = PageParams::new(0, 500);
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), MAX_PER_PAGE);

        let params = PageParams::new(3, 0);
        assert_eq!(params.per_page(), 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_offset() {
        let params = PageParams::new(3, 20);
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
    }

    #[test]
    fn test_paginated_serialization() {
        let page = Paginated::new(vec![1, 2, 3], &PageParams::new(2, 3), 7);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["pagination"]["page"], 2);
        assert_eq!(json["pagination"]["total"], 7);
    }

    #[test]
    fn test_paginated_map() {
        let page = Paginated::new(vec![1, 2], &PageParams::default(), 2).map(|n| n * 10);
        assert_eq!(page.data, vec![10, 20]);
        assert_eq!(page.pagination.total, 2);
    }
}
