pub mod businesses;
pub mod health;
pub mod stores;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health_check))
        .route(
            "/api/stores",
            get(stores::list_stores).post(stores::create_store),
        )
        .route("/api/stores/search", get(stores::search_stores))
        .route("/api/stores/nearby", get(stores::nearby_stores))
        .route("/api/stores/refresh", post(stores::refresh_stores))
        .route("/api/stores/stats/overview", get(stores::store_stats))
        .route(
            "/api/stores/{id}",
            get(stores::get_store)
                .put(stores::update_store)
                .delete(stores::delete_store),
        )
        .route("/api/businesses", get(businesses::list_businesses))
        .route("/api/businesses/categories", get(businesses::list_categories))
        .route(
            "/api/businesses/refresh/{category}",
            post(businesses::refresh_category),
        )
        .route("/api/businesses/stats", get(businesses::business_stats))
        .route("/api/businesses/{id}", get(businesses::get_business))
        .with_state(state)
}
