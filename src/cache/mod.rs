use crate::models::{BoundingBox, BusinessCategory, NewBusiness};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub mod memory;

pub use memory::MemoryIngestCache;

/// Cache of records fetched from the map data service, keyed per category
/// and region so repeated refreshes within the TTL skip the upstream call.
#[async_trait]
pub trait IngestCache: Send + Sync {
    async fn get_businesses(&self, key: &str) -> Option<Vec<NewBusiness>>;

    async fn cache_businesses(&self, key: &str, businesses: &[NewBusiness]);

    async fn invalidate(&self, key: &str);

    async fn get_stats(&self) -> CacheStats;

    fn backend_name(&self) -> &'static str;
}

/// Key for one category fetch over a region.
/// Bounds are rounded to 3 decimal places (~100m).
pub fn ingest_cache_key(category: BusinessCategory, region: &BoundingBox) -> String {
    let mut hasher = DefaultHasher::new();

    for bound in [region.min_lat, region.min_lng, region.max_lat, region.max_lng] {
        ((bound * 1000.0).round() as i64).hash(&mut hasher);
    }

    format!("ingest:{}:{:x}", category, hasher.finish())
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: u64,
}
