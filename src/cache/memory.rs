use crate::cache::{CacheStats, IngestCache};
use crate::models::NewBusiness;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory cache backed by moka with TTL and bounded capacity.
pub struct MemoryIngestCache {
    entries: Cache<String, Arc<Vec<NewBusiness>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryIngestCache {
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        MemoryIngestCache {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl IngestCache for MemoryIngestCache {
    async fn get_businesses(&self, key: &str) -> Option<Vec<NewBusiness>> {
        match self.entries.get(key).await {
            Some(cached) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Ingest cache hit: {}", key);
                Some((*cached).clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Ingest cache miss: {}", key);
                None
            }
        }
    }

    async fn cache_businesses(&self, key: &str, businesses: &[NewBusiness]) {
        self.entries
            .insert(key.to_string(), Arc::new(businesses.to_vec()))
            .await;
        tracing::debug!("Cached {} fetched records: {}", businesses.len(), key);
    }

    async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    async fn get_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses > 0 {
            (hits as f64 / (hits + misses) as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: self.entries.entry_count(),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
