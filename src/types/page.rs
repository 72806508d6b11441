use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 25;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Page window computed from the total row count and the requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub offset: i64,
}

/// Out-of-range pages are clamped to `[1, total_pages]`.
pub fn calculate_pagination(total: i64, requested_page: i64, limit: i64) -> Pagination {
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);
    let total_pages = (total + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    Pagination {
        page,
        limit,
        total_pages,
        offset: (page - 1) * limit,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, window: Pagination) -> Self {
        Self {
            items,
            total,
            page: window.page,
            limit: window.limit,
            total_pages: window.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_normal() {
        let p = calculate_pagination(60, 2, 25);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 25);
    }

    #[test]
    fn pagination_clamps_out_of_range_page() {
        let p = calculate_pagination(60, 99, 25);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset, 50);
    }

    #[test]
    fn pagination_empty_result_is_page_one() {
        let p = calculate_pagination(0, 4, 25);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn pagination_limits_are_bounded() {
        assert_eq!(calculate_pagination(10, 1, 0).limit, 1);
        assert_eq!(calculate_pagination(10, 1, 10_000).limit, MAX_PAGE_LIMIT);
    }
}
