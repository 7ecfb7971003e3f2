//! Pagination utilities for blb-admin listings

use serde::Serialize;

/// Upper bound on a requested page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub limit: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Pagination block returned alongside listed items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: self.total_pages,
        }
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// The page size is clamped to `[1, MAX_PAGE_SIZE]` and the page to
/// `[1, total_pages]`.
///
/// # Examples
/// ```
/// use blb_admin::pagination::calculate_pagination;
///
/// // 45 conflicts at 20 per page = 3 pages (20 + 20 + 5)
/// let p = calculate_pagination(45, 2, 20);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(45, 99, 20);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let limit = page_size.clamp(1, MAX_PAGE_SIZE);
    let total_pages = (total_results + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total_pages,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(150, 99, 100);
        assert_eq!(p.page, 2); // Clamped to last page
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(150, 0, 100);
        assert_eq!(p.page, 1); // Clamped to first page
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
        assert_eq!(p.info(0).total, 0);
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(calculate_pagination(10, 1, 0).limit, 1);
        assert_eq!(calculate_pagination(10, 1, 5000).limit, MAX_PAGE_SIZE);
    }
}
