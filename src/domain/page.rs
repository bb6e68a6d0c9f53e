use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// One page of a listing plus enough metadata to draw a pager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub total: u64,
    pub records: Vec<T>,
    pub current: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T> PageResult<T> {
    /// Cuts the requested page out of an already filtered and sorted list.
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let skip = (request.current - 1).saturating_mul(request.size) as usize;
        let records: Vec<T> = items
            .into_iter()
            .skip(skip)
            .take(request.size as usize)
            .collect();
        Self {
            total,
            records,
            current: request.current,
            size: request.size,
            pages: total.div_ceil(request.size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub current: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(current: Option<u64>, size: Option<u64>) -> Self {
        Self {
            current: current.unwrap_or(1).max(1),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_inputs() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { current: 1, size: 1 });
        assert_eq!(PageRequest::new(None, Some(500)).size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::default(), PageRequest { current: 1, size: 10 });
    }

    #[test]
    fn test_paginate_middle_and_last_page() {
        let items: Vec<u32> = (1..=25).collect();

        let second = PageResult::paginate(items.clone(), PageRequest::new(Some(2), Some(10)));
        assert_eq!(second.records, (11..=20).collect::<Vec<_>>());
        assert_eq!(second.pages, 3);
        assert_eq!(second.total, 25);

        let last = PageResult::paginate(items, PageRequest::new(Some(3), Some(10)));
        assert_eq!(last.records, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn test_paginate_past_the_end_is_empty() {
        let page = PageResult::paginate(vec![1, 2, 3], PageRequest::new(Some(9), Some(10)));
        assert!(page.records.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn test_paginate_empty_list_has_zero_pages() {
        let page: PageResult<u32> = PageResult::paginate(Vec::new(), PageRequest::default());
        assert_eq!(page.pages, 0);
    }
}
