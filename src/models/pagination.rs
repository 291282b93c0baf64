use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    20
}

/// Page/size query parameters shared by every list endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PageParams {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than or equal to 1"))]
    pub page: i64,

    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = 100, message = "size must be between 1 and 100"))]
    pub size: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl PageParams {
    /// Saturates for huge pages, which then simply come back empty
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.size)
    }

    pub fn limit(&self) -> i64 {
        self.size
    }
}

/// A page of results plus the numbers a client needs to walk the rest
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let pages = total_pages(total, params.size);
        Self {
            items,
            total,
            page: params.page,
            size: params.size,
            pages,
            has_next: params.page < pages,
            has_previous: params.page > 1,
        }
    }
}

pub fn total_pages(total: i64, size: i64) -> i64 {
    if total <= 0 || size <= 0 {
        return 0;
    }
    (total + size - 1) / size
}
