use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// 分页查询参数 (page 从 1 开始)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.per_page() as u64
    }

    pub fn limit(&self) -> u64 {
        self.per_page() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PageInfo {
    pub fn new(query: &PageQuery, total: u64) -> Self {
        let per_page = query.per_page();
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(per_page as u64) as u32
        };

        Self {
            current_page: query.page(),
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query() {
        let query = PageQuery::new(Some(2), Some(10));
        assert_eq!(query.page(), 2);
        assert_eq!(query.per_page(), 10);
        assert_eq!(query.offset(), 10);
        assert_eq!(query.limit(), 10);
    }

    #[test]
    fn test_page_query_defaults_and_clamps() {
        let query = PageQuery::new(None, None);
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);
        assert_eq!(query.offset(), 0);

        let query = PageQuery::new(Some(0), Some(1000));
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 100);
    }

    #[test]
    fn test_page_info() {
        let info = PageInfo::new(&PageQuery::new(Some(2), Some(10)), 25);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.total, 25);
        assert_eq!(info.total_pages, 3);

        let empty = PageInfo::new(&PageQuery::default(), 0);
        assert_eq!(empty.total_pages, 1);
    }
}
