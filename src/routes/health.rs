use crate::constants::SERVICE_NAME;
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /health - Check if services are working
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut status = json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    match state.directory.ping().await {
        Ok(()) => {
            status["checks"]["database"] = json!("ok");
        }
        Err(e) => {
            status["checks"]["database"] = json!({"error": e.to_string()});
            status["status"] = json!("unhealthy");
        }
    }

    let cache = state.directory.cache_stats().await;
    status["checks"]["ingest_cache"] = json!({
        "backend": state.directory.cache_backend(),
        "entries": cache.entries,
        "hit_rate": cache.hit_rate,
    });

    Json(status)
}

/// GET / - API index
pub async fn index() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "stores": "/api/stores",
            "store_search": "/api/stores/search",
            "nearby_stores": "/api/stores/nearby",
            "store_stats": "/api/stores/stats/overview",
            "businesses": "/api/businesses",
            "categories": "/api/businesses/categories",
            "business_stats": "/api/businesses/stats",
            "health": "/health"
        }
    }))
}
