use crate::cache::{ingest_cache_key, CacheStats, IngestCache, MemoryIngestCache};
use crate::config::Config;
use crate::constants::*;
use crate::db::{BusinessFilter, BusinessRepository, SqliteBusinessRepository};
use crate::error::{AppError, Result};
use crate::models::{
    BoundingBox, Business, BusinessCategory, BusinessList, BusinessStats, BusinessUpdate,
    CategoryList, CategorySummary, Coordinates, ListParams, NearbyParams, NewBusiness, Page,
    SearchFilters, StoreStats, UpsertSummary,
};
use crate::services::overpass::OverpassClient;
use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Result of ingesting one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub category: BusinessCategory,
    pub fetched: usize,
    pub from_cache: bool,
    #[serde(flatten)]
    pub summary: UpsertSummary,
}

/// Query and ingestion operations behind the REST surface.
#[derive(Clone)]
pub struct DirectoryService {
    repository: Arc<dyn BusinessRepository>,
    overpass: OverpassClient,
    cache: Arc<dyn IngestCache>,
    region: BoundingBox,
}

/// `/api/stores` is the open-grocery view of the directory.
fn store_filter() -> BusinessFilter {
    BusinessFilter {
        exclude_closed: true,
        ..BusinessFilter::category(BusinessCategory::Grocery)
    }
}

fn validate_center(lat: f64, lng: f64) -> Result<Coordinates> {
    Coordinates::new(lat, lng).map_err(AppError::InvalidRequest)
}

fn validate_search(filters: &SearchFilters) -> Result<()> {
    if let Some(radius) = filters.radius {
        if !(MIN_SEARCH_RADIUS_M..=MAX_SEARCH_RADIUS_M).contains(&radius) {
            return Err(AppError::InvalidRequest(format!(
                "radius must be between {} and {} meters",
                MIN_SEARCH_RADIUS_M, MAX_SEARCH_RADIUS_M
            )));
        }
    }
    if let Some(min_rating) = filters.min_rating {
        if !(0.0..=5.0).contains(&min_rating) {
            return Err(AppError::InvalidRequest(
                "min_rating must be between 0 and 5".to_string(),
            ));
        }
    }
    if let Some(max_price) = filters.max_price_level {
        if max_price > 4 {
            return Err(AppError::InvalidRequest(
                "max_price_level must be between 0 and 4".to_string(),
            ));
        }
    }
    if let (Some(lat), Some(lng)) = (filters.latitude, filters.longitude) {
        validate_center(lat, lng)?;
    }
    Ok(())
}

/// Slice an in-memory, already ordered result set into a page.
fn paginate(items: Vec<Business>, offset: u32, limit: u32) -> Page<Business> {
    let total = items.len() as u64;
    let window = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Page::new(window, total, offset, limit)
}

impl DirectoryService {
    pub fn new(
        repository: Arc<dyn BusinessRepository>,
        overpass: OverpassClient,
        cache: Arc<dyn IngestCache>,
        region: BoundingBox,
    ) -> Self {
        DirectoryService {
            repository,
            overpass,
            cache,
            region,
        }
    }

    /// SQLite repository, Overpass client and in-memory ingest cache as
    /// described by `config`.
    pub fn from_config(config: &Config, pool: SqlitePool) -> Self {
        let overpass = match config.overpass_url {
            Some(ref url) => OverpassClient::with_endpoint(url.clone()),
            None => OverpassClient::new(),
        }
        .with_limit(config.ingest_limit);

        DirectoryService::new(
            Arc::new(SqliteBusinessRepository::new(pool)),
            overpass,
            Arc::new(MemoryIngestCache::new(
                config.ingest_cache_ttl,
                INGEST_CACHE_MAX_ENTRIES,
            )),
            config.region,
        )
    }

    pub fn region(&self) -> &BoundingBox {
        &self.region
    }

    // --- Stores (grocery view) ---

    pub async fn list_stores(&self, params: ListParams) -> Result<Page<Business>> {
        let limit = params.limit.clamp(1, MAX_STORE_PAGE_SIZE);
        self.repository
            .search(&store_filter(), params.skip, limit)
            .await
    }

    /// Text and attribute search over stores. With a center the results
    /// are restricted to the radius and ordered by distance.
    pub async fn search_stores(&self, filters: &SearchFilters) -> Result<Page<Business>> {
        validate_search(filters)?;
        let limit = filters.limit.clamp(1, MAX_STORE_PAGE_SIZE);

        let mut filter = BusinessFilter::from_search(filters);
        filter.category = Some(BusinessCategory::Grocery);
        filter.exclude_closed = true;

        match filters.center() {
            Some(center) => {
                let all = self
                    .repository
                    .find_nearby(&center, filters.radius_or_default(), &filter, u32::MAX)
                    .await?;
                Ok(paginate(all, filters.offset, limit))
            }
            None => self.repository.search(&filter, filters.offset, limit).await,
        }
    }

    pub async fn nearby_stores(&self, params: &NearbyParams) -> Result<Vec<Business>> {
        let center = validate_center(params.latitude, params.longitude)?;
        let radius = params.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_M);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(AppError::InvalidRequest(
                "radius must be a positive number of meters".to_string(),
            ));
        }
        let radius = radius.min(MAX_NEARBY_RADIUS_M);
        let limit = params.limit.clamp(1, MAX_NEARBY_LIMIT);

        let stores = self
            .repository
            .find_nearby(&center, radius, &store_filter(), limit)
            .await?;
        tracing::info!(
            "Found {} stores within {}m of ({}, {})",
            stores.len(),
            radius,
            center.lat,
            center.lng
        );
        Ok(stores)
    }

    pub async fn store_stats(&self) -> Result<StoreStats> {
        self.repository.store_stats().await
    }

    // --- Records ---

    pub async fn get(&self, id: i64) -> Result<Business> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))
    }

    pub async fn create(&self, business: &NewBusiness) -> Result<Business> {
        business.validate().map_err(AppError::InvalidRequest)?;
        let created = self.repository.insert(business).await?;
        tracing::info!("Created business {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn update(&self, id: i64, update: &BusinessUpdate) -> Result<Business> {
        update.validate().map_err(AppError::InvalidRequest)?;
        if update.is_empty() {
            return self.get(id).await;
        }
        self.repository
            .update(id, update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if self.repository.delete(id).await? {
            tracing::info!("Deleted business {}", id);
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Business {} not found", id)))
        }
    }

    // --- Businesses ---

    /// Filtered listing. With both coordinates this switches to a nearby
    /// lookup: distance ordered, at most `limit` results, no further pages.
    pub async fn list_businesses(&self, filters: &SearchFilters) -> Result<BusinessList> {
        if !(1..=MAX_BUSINESS_PAGE_SIZE).contains(&filters.limit) {
            return Err(AppError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_BUSINESS_PAGE_SIZE
            )));
        }
        validate_search(filters)?;

        let filter = BusinessFilter::from_search(filters);
        let page = match filters.center() {
            Some(center) => {
                let nearby = self
                    .repository
                    .find_nearby(&center, filters.radius_or_default(), &filter, filters.limit)
                    .await?;
                let mut page = Page::complete(nearby);
                page.limit = filters.limit;
                page
            }
            None => {
                self.repository
                    .search(&filter, filters.offset, filters.limit)
                    .await?
            }
        };

        Ok(BusinessList::from_page(page, filters.category))
    }

    pub async fn categories(&self) -> Result<CategoryList> {
        let counts = self.repository.category_counts().await?;
        let categories = BusinessCategory::ALL
            .iter()
            .map(|c| CategorySummary::new(*c, counts.get(c).copied().unwrap_or(0)))
            .collect();
        Ok(CategoryList { categories })
    }

    pub async fn business_stats(&self, category: Option<BusinessCategory>) -> Result<BusinessStats> {
        self.repository.business_stats(category).await
    }

    // --- Ingestion ---

    /// Fetch one category for the configured region and upsert it.
    /// A cached fetch is reused unless `force` is set.
    pub async fn refresh_category(
        &self,
        category: BusinessCategory,
        force: bool,
    ) -> Result<IngestReport> {
        let key = ingest_cache_key(category, &self.region);

        let cached = if force {
            self.cache.invalidate(&key).await;
            None
        } else {
            self.cache.get_businesses(&key).await
        };

        let from_cache = cached.is_some();
        let fetched = match cached {
            Some(businesses) => businesses,
            None => {
                let businesses = self.overpass.fetch_category(category, &self.region).await?;
                self.cache.cache_businesses(&key, &businesses).await;
                businesses
            }
        };

        let summary = self.repository.upsert_batch(&fetched).await?;
        tracing::info!(
            "Refreshed {}: {} fetched{}, {} added, {} updated",
            category,
            fetched.len(),
            if from_cache { " (cached)" } else { "" },
            summary.added,
            summary.updated
        );

        Ok(IngestReport {
            category,
            fetched: fetched.len(),
            from_cache,
            summary,
        })
    }

    /// Run [`refresh_category`](Self::refresh_category) on the runtime and
    /// return immediately with the job id.
    pub fn spawn_refresh(&self, category: BusinessCategory, force: bool) -> (Uuid, JoinHandle<()>) {
        let job_id = Uuid::new_v4();
        let service = self.clone();

        let handle = tokio::spawn(async move {
            tracing::info!("Refresh job {} started for {}", job_id, category);
            match service.refresh_category(category, force).await {
                Ok(report) => tracing::info!(
                    "Refresh job {} finished: {} records",
                    job_id,
                    report.summary.total()
                ),
                Err(e) => tracing::warn!("Refresh job {} failed: {}", job_id, e),
            }
        });

        (job_id, handle)
    }

    /// Refresh several categories concurrently.
    pub async fn refresh_all(
        &self,
        categories: &[BusinessCategory],
        force: bool,
    ) -> Vec<(BusinessCategory, Result<IngestReport>)> {
        let futures = categories
            .iter()
            .map(|&category| async move { (category, self.refresh_category(category, force).await) });
        join_all(futures).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats().await
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    pub async fn ping(&self) -> Result<()> {
        self.repository.ping().await
    }
}
