use crate::error::{AppError, Result};
use crate::models::{
    Business, BusinessCategory, BusinessList, BusinessStats, CategoryList, RefreshAck,
    SearchFilters,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub category: Option<String>,
}

fn parse_category(raw: &str) -> Result<BusinessCategory> {
    raw.parse::<BusinessCategory>()
        .map_err(AppError::InvalidRequest)
}

/// GET /api/businesses
pub async fn list_businesses(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<SearchFilters>,
) -> Result<Json<BusinessList>> {
    let list = state.directory.list_businesses(&filters).await?;
    tracing::info!(
        "Business listing returned {} of {} (category: {:?})",
        list.businesses.len(),
        list.total,
        list.category
    );
    Ok(Json(list))
}

/// GET /api/businesses/categories
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Result<Json<CategoryList>> {
    Ok(Json(state.directory.categories().await?))
}

/// POST /api/businesses/refresh/{category}
pub async fn refresh_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<(StatusCode, Json<RefreshAck>)> {
    let category = parse_category(&category)?;
    let (job_id, _) = state.directory.spawn_refresh(category, false);
    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshAck::started(job_id, category, false)),
    ))
}

/// GET /api/businesses/stats?category
pub async fn business_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<BusinessStats>> {
    let category = match params.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_category(raw)?),
    };
    Ok(Json(state.directory.business_stats(category).await?))
}

/// GET /api/businesses/{id}
pub async fn get_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Business>> {
    Ok(Json(state.directory.get(id).await?))
}
