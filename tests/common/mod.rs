use bizmap::cache::MemoryIngestCache;
use bizmap::db::SqliteBusinessRepository;
use bizmap::models::{Business, BusinessCategory, Coordinates, NewBusiness};
use bizmap::services::{DirectoryService, OverpassClient};
use bizmap::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Fresh in-memory directory. Overpass points at an unroutable address so
/// nothing here can reach the network.
#[allow(dead_code)]
pub async fn setup_directory() -> DirectoryService {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    SqliteBusinessRepository::create_schema(&pool)
        .await
        .expect("Failed to create schema");

    DirectoryService::new(
        Arc::new(SqliteBusinessRepository::new(pool)),
        OverpassClient::with_endpoint("http://127.0.0.1:9/api/interpreter")
            .with_backoff(Duration::from_millis(1)),
        Arc::new(MemoryIngestCache::new(3600, 16)),
        bizmap::models::BoundingBox::default_region(),
    )
}

#[allow(dead_code)]
pub async fn setup_test_app() -> (axum::Router, DirectoryService) {
    let directory = setup_directory().await;
    let state = Arc::new(AppState {
        directory: directory.clone(),
    });
    (bizmap::routes::create_router(state), directory)
}

/// Create payload with only the required fields
#[allow(dead_code)]
pub fn new_business(
    place_id: &str,
    name: &str,
    category: BusinessCategory,
    lat: f64,
    lng: f64,
) -> NewBusiness {
    NewBusiness::new(
        place_id,
        name,
        category,
        Coordinates::new(lat, lng).unwrap(),
    )
}

/// Served record, as the client-side tests feed it back through mocks
#[allow(dead_code)]
pub fn business(id: i64, name: &str, category: BusinessCategory) -> Business {
    Business {
        id,
        place_id: Some(format!("osm_node_{}", id)),
        name: name.to_string(),
        latitude: 35.8989,
        longitude: 14.5146,
        category,
        formatted_address: None,
        phone_number: None,
        website: None,
        email: None,
        rating: None,
        user_ratings_total: None,
        price_level: None,
        business_status: None,
        permanently_closed: false,
        opening_hours: None,
        business_types: Vec::new(),
        brand: None,
        operator: None,
        osm_type: Some("node".to_string()),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: None,
        last_verified: None,
        distance_km: None,
    }
}

/// Businesses `range`, all in `category`
#[allow(dead_code)]
pub fn businesses(range: std::ops::Range<i64>, category: BusinessCategory) -> Vec<Business> {
    range
        .map(|id| business(id, &format!("Place {}", id), category))
        .collect()
}

/// Check if we should skip real API tests
#[allow(dead_code)]
pub fn should_skip_real_api_tests() -> bool {
    std::env::var("SKIP_REAL_API_TESTS").is_ok()
}
