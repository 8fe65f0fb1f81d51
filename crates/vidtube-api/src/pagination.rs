use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A resolved 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u64) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

impl Page {
    /// Zero-based index for sea-orm's paginator.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total.div_ceil(page.limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_values() {
        let page = PageQuery::default().resolve(10);
        assert_eq!(page, Page { page: 1, limit: 10 });
        assert_eq!(page.index(), 0);
    }

    #[test]
    fn limit_is_clamped() {
        let q = PageQuery { page: Some(3), limit: Some(0) };
        assert_eq!(q.resolve(10).limit, 1);

        let q = PageQuery { page: Some(3), limit: Some(5_000) };
        assert_eq!(q.resolve(10).limit, MAX_LIMIT);
    }

    #[test]
    fn page_zero_becomes_first_page() {
        let q = PageQuery { page: Some(0), limit: None };
        assert_eq!(q.resolve(20), Page { page: 1, limit: 20 });
    }

    #[test]
    fn total_pages_rounds_up() {
        let paged = Paged::new(vec![1, 2], 21, Page { page: 3, limit: 10 });
        assert_eq!(paged.total_pages, 3);
        assert_eq!(Paged::<u8>::new(vec![], 0, Page { page: 1, limit: 10 }).total_pages, 0);
    }
}
