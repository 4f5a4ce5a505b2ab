use crate::error::Result;
use crate::models::{
    Business, BusinessCategory, BusinessStats, BusinessUpdate, Coordinates, NewBusiness, Page,
    SearchFilters, StoreStats, UpsertSummary,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Row-level criteria shared by paged searches and nearby lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessFilter {
    /// Case-insensitive substring of name or address
    pub text: Option<String>,
    pub category: Option<BusinessCategory>,
    pub min_rating: Option<f64>,
    pub max_price_level: Option<u8>,
    pub exclude_closed: bool,
}

impl BusinessFilter {
    pub fn category(category: BusinessCategory) -> Self {
        BusinessFilter {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn from_search(filters: &SearchFilters) -> Self {
        BusinessFilter {
            text: filters.text().map(str::to_string),
            category: filters.category,
            min_rating: filters.min_rating,
            max_price_level: filters.max_price_level,
            exclude_closed: filters.exclude_closed.unwrap_or(false),
        }
    }

    /// Same predicate the repository applies in SQL, evaluated on a
    /// loaded record.
    pub fn matches(&self, business: &Business) -> bool {
        if let Some(ref text) = self.text {
            if !business.matches_text(text) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if business.category != category {
                return false;
            }
        }
        if let Some(min_rating) = self.min_rating {
            if business.rating.map_or(true, |r| r < min_rating) {
                return false;
            }
        }
        if let Some(max_price) = self.max_price_level {
            if business.price_level.map_or(true, |p| p > max_price) {
                return false;
            }
        }
        !(self.exclude_closed && business.permanently_closed)
    }
}

// ---------------------------------------------------------------------------
// Shared row-to-Business conversion
// ---------------------------------------------------------------------------

pub(super) fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

fn parse_timestamp(raw: &str, field: &str, id: i64) -> Option<OffsetDateTime> {
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(ts) => Some(ts),
        Err(e) => {
            tracing::warn!("Invalid {} '{}' for business {}: {}", field, raw, id, e);
            None
        }
    }
}

/// Raw business fields as stored, before validation.
#[derive(sqlx::FromRow)]
pub(super) struct RawBusinessRow {
    pub id: i64,
    pub place_id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
    pub formatted_address: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<i64>,
    pub price_level: Option<i64>,
    pub business_status: Option<String>,
    pub permanently_closed: bool,
    pub opening_hours: Option<String>,
    pub business_types: Option<String>,
    pub brand: Option<String>,
    pub operator: Option<String>,
    pub osm_type: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub last_verified: Option<String>,
}

impl RawBusinessRow {
    pub fn into_business(self) -> Business {
        let category = self.category.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid category '{}' for business '{}' (id: {}), defaulting to grocery",
                self.category,
                self.name,
                self.id
            );
            BusinessCategory::Grocery
        });

        let business_types = self
            .business_types
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|raw| {
                serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|e| {
                    tracing::warn!("Invalid business_types for business {}: {}", self.id, e);
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let user_ratings_total = self
            .user_ratings_total
            .and_then(|n| u32::try_from(n).ok());
        let price_level = self.price_level.and_then(|p| u8::try_from(p).ok());

        let created_at = parse_timestamp(&self.created_at, "created_at", self.id)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let updated_at = self
            .updated_at
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, "updated_at", self.id));
        let last_verified = self
            .last_verified
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, "last_verified", self.id));

        Business {
            id: self.id,
            place_id: self.place_id,
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            category,
            formatted_address: self.formatted_address,
            phone_number: self.phone_number,
            website: self.website,
            email: self.email,
            rating: self.rating,
            user_ratings_total,
            price_level,
            business_status: self.business_status,
            permanently_closed: self.permanently_closed,
            opening_hours: self.opening_hours,
            business_types,
            brand: self.brand,
            operator: self.operator,
            osm_type: self.osm_type,
            created_at,
            updated_at,
            last_verified,
            distance_km: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Repository trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    /// Name-ordered page of records matching `filter`.
    async fn search(&self, filter: &BusinessFilter, offset: u32, limit: u32)
        -> Result<Page<Business>>;

    /// Records within `radius_m` of `center`, nearest first, each annotated
    /// with `distance_km`.
    async fn find_nearby(
        &self,
        center: &Coordinates,
        radius_m: f64,
        filter: &BusinessFilter,
        limit: u32,
    ) -> Result<Vec<Business>>;

    async fn get(&self, id: i64) -> Result<Option<Business>>;

    /// Fails with `AppError::Conflict` when the `place_id` is taken.
    async fn insert(&self, business: &NewBusiness) -> Result<Business>;

    async fn update(&self, id: i64, update: &BusinessUpdate) -> Result<Option<Business>>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Insert or refresh ingested records in one transaction. A record
    /// matches an existing one by `place_id`, or else by name and category
    /// at (almost) the same location.
    async fn upsert_batch(&self, businesses: &[NewBusiness]) -> Result<UpsertSummary>;

    async fn count(&self, filter: &BusinessFilter) -> Result<u64>;

    /// Rating coverage over open grocery stores
    async fn store_stats(&self) -> Result<StoreStats>;

    async fn business_stats(&self, category: Option<BusinessCategory>) -> Result<BusinessStats>;

    /// Record count per category; every category is present, possibly zero.
    async fn category_counts(&self) -> Result<BTreeMap<BusinessCategory, u64>>;

    async fn ping(&self) -> Result<()>;
}
