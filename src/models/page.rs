use crate::models::{Business, BusinessCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Anything with a stable numeric id that pages can dedupe on.
pub trait Identified {
    fn key(&self) -> i64;
}

impl Identified for Business {
    fn key(&self) -> i64 {
        self.id
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T: Identified> Page<T> {
    /// Build a page, dropping repeated ids and deriving `has_more`.
    pub fn new(items: Vec<T>, total: u64, offset: u32, limit: u32) -> Self {
        let mut seen = HashSet::with_capacity(items.len());
        let items: Vec<T> = items.into_iter().filter(|i| seen.insert(i.key())).collect();
        let has_more = (offset as u64) + (items.len() as u64) < total;
        Page {
            items,
            total,
            offset,
            limit,
            has_more,
        }
    }

    /// A complete, unpaginated result set (nearby queries)
    pub fn complete(items: Vec<T>) -> Self {
        let len = items.len();
        let mut page = Page::new(items, len as u64, 0, len as u32);
        page.total = page.items.len() as u64;
        page.has_more = false;
        page
    }
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offset of the page after this one
    pub fn next_offset(&self) -> u32 {
        self.offset + self.items.len() as u32
    }
}

/// Wire envelope of `/api/stores` and `/api/stores/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreList {
    pub stores: Vec<Business>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

impl From<Page<Business>> for StoreList {
    fn from(page: Page<Business>) -> Self {
        StoreList {
            stores: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more,
        }
    }
}

impl From<StoreList> for Page<Business> {
    fn from(list: StoreList) -> Self {
        Page::new(list.stores, list.total, list.offset, list.limit)
    }
}

/// Wire envelope of `/api/businesses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessList {
    pub businesses: Vec<Business>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
    #[serde(default)]
    pub category: Option<BusinessCategory>,
}

impl BusinessList {
    pub fn from_page(page: Page<Business>, category: Option<BusinessCategory>) -> Self {
        BusinessList {
            businesses: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more,
            category,
        }
    }
}

impl From<BusinessList> for Page<Business> {
    fn from(list: BusinessList) -> Self {
        let mut page = Page::new(list.businesses, list.total, list.offset, list.limit);
        // Nearby mode reports has_more=false regardless of the count
        page.has_more = page.has_more && list.has_more;
        page
    }
}
