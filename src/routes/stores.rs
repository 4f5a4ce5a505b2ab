use crate::error::Result;
use crate::models::{
    Business, BusinessCategory, BusinessUpdate, ListParams, NearbyParams, NewBusiness,
    RefreshAck, RefreshRequest, SearchFilters, StoreList, StoreStats,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /api/stores - Open grocery stores, name ordered
pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<StoreList>> {
    let page = state.directory.list_stores(params).await?;
    Ok(Json(page.into()))
}

/// GET /api/stores/search
pub async fn search_stores(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<SearchFilters>,
) -> Result<Json<StoreList>> {
    tracing::debug!("Store search: {:?}", filters);
    let page = state.directory.search_stores(&filters).await?;
    Ok(Json(page.into()))
}

/// GET /api/stores/nearby - Flat list, nearest first
pub async fn nearby_stores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<Business>>> {
    let stores = state.directory.nearby_stores(&params).await?;
    Ok(Json(stores))
}

/// GET /api/stores/{id}
pub async fn get_store(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Business>> {
    Ok(Json(state.directory.get(id).await?))
}

/// POST /api/stores
pub async fn create_store(
    State(state): State<Arc<AppState>>,
    Json(store): Json<NewBusiness>,
) -> Result<Json<Business>> {
    Ok(Json(state.directory.create(&store).await?))
}

/// PUT /api/stores/{id}
pub async fn update_store(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<BusinessUpdate>,
) -> Result<Json<Business>> {
    Ok(Json(state.directory.update(id, &update).await?))
}

/// DELETE /api/stores/{id}
pub async fn delete_store(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.directory.delete(id).await?;
    Ok(Json(json!({ "message": format!("Store {} deleted", id) })))
}

/// POST /api/stores/refresh - Re-ingest grocery stores in the background.
/// The body is optional.
pub async fn refresh_stores(
    State(state): State<Arc<AppState>>,
    request: Option<Json<RefreshRequest>>,
) -> (StatusCode, Json<RefreshAck>) {
    let force = request.map(|Json(r)| r.force_refresh).unwrap_or(false);
    let (job_id, _) = state
        .directory
        .spawn_refresh(BusinessCategory::Grocery, force);
    (
        StatusCode::ACCEPTED,
        Json(RefreshAck::started(job_id, BusinessCategory::Grocery, force)),
    )
}

/// GET /api/stores/stats/overview
pub async fn store_stats(State(state): State<Arc<AppState>>) -> Result<Json<StoreStats>> {
    Ok(Json(state.directory.store_stats().await?))
}
