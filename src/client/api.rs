use crate::config::ClientConfig;
use crate::models::{
    Business, BusinessCategory, BusinessList, BusinessStats, BusinessUpdate, CategoryList,
    CategorySummary, Coordinates, ListParams, NearbyParams, NewBusiness, Page, RefreshAck,
    RefreshRequest, SearchFilters, StoreList, StoreStats,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failure of a single API call. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Unable to reach the server: {0}")]
    Network(String),

    #[error("The request timed out")]
    Timeout,

    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Unexpected response from server: {0}")]
    Malformed(String),
}

impl ClientError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Malformed(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// `GET /health` answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub checks: serde_json::Value,
}

#[derive(Deserialize)]
struct DeleteResponse {
    message: String,
}

/// The backend's `message`, else its `detail`, else the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "detail"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        });

    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    }
}

/// Typed client for the directory REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credential: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(ApiClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credential: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token sent with every request until a 401 clears it
    pub async fn set_credential(&self, token: impl Into<String>) {
        *self.credential.write().await = Some(token.into());
    }

    pub async fn credential(&self) -> Option<String> {
        self.credential.read().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request = match self.credential.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            *self.credential.write().await = None;
            tracing::warn!("API answered 401, cleared stored credential");
            return Err(ClientError::Unauthorized {
                message: error_message(status, &body),
            });
        }

        if !status.is_success() {
            let message = error_message(status, &body);
            tracing::debug!("API error {}: {}", status, message);
            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    // --- Stores ---

    pub async fn list_stores(&self, skip: u32, limit: u32) -> Result<Page<Business>, ClientError> {
        let params = ListParams { skip, limit };
        let list: StoreList = self
            .send(self.http.get(self.url("/api/stores")).query(&params))
            .await?;
        Ok(list.into())
    }

    pub async fn search_stores(&self, filters: &SearchFilters) -> Result<Page<Business>, ClientError> {
        let list: StoreList = self
            .send(
                self.http
                    .get(self.url("/api/stores/search"))
                    .query(&filters.to_query_pairs()),
            )
            .await?;
        Ok(list.into())
    }

    /// Flat, distance-ordered list; radius in meters.
    pub async fn nearby_stores(
        &self,
        center: Coordinates,
        radius_m: f64,
        limit: u32,
    ) -> Result<Vec<Business>, ClientError> {
        let params = NearbyParams::new(center, radius_m, limit);
        self.send(self.http.get(self.url("/api/stores/nearby")).query(&params))
            .await
    }

    pub async fn get_store(&self, id: i64) -> Result<Business, ClientError> {
        self.send(self.http.get(self.url(&format!("/api/stores/{}", id))))
            .await
    }

    pub async fn create_store(&self, store: &NewBusiness) -> Result<Business, ClientError> {
        self.send(self.http.post(self.url("/api/stores")).json(store))
            .await
    }

    pub async fn update_store(&self, id: i64, update: &BusinessUpdate) -> Result<Business, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/api/stores/{}", id)))
                .json(update),
        )
        .await
    }

    /// Returns the server's confirmation message.
    pub async fn delete_store(&self, id: i64) -> Result<String, ClientError> {
        let response: DeleteResponse = self
            .send(self.http.delete(self.url(&format!("/api/stores/{}", id))))
            .await?;
        Ok(response.message)
    }

    /// Trigger re-ingestion; completes before the ingestion does.
    pub async fn refresh_stores(&self, force_refresh: bool) -> Result<RefreshAck, ClientError> {
        self.send(
            self.http
                .post(self.url("/api/stores/refresh"))
                .json(&RefreshRequest { force_refresh }),
        )
        .await
    }

    pub async fn store_stats(&self) -> Result<StoreStats, ClientError> {
        self.send(self.http.get(self.url("/api/stores/stats/overview")))
            .await
    }

    // --- Businesses ---

    pub async fn list_businesses(&self, filters: &SearchFilters) -> Result<Page<Business>, ClientError> {
        let list: BusinessList = self
            .send(
                self.http
                    .get(self.url("/api/businesses"))
                    .query(&filters.to_query_pairs()),
            )
            .await?;
        Ok(list.into())
    }

    pub async fn get_business(&self, id: i64) -> Result<Business, ClientError> {
        self.send(self.http.get(self.url(&format!("/api/businesses/{}", id))))
            .await
    }

    pub async fn categories(&self) -> Result<Vec<CategorySummary>, ClientError> {
        let list: CategoryList = self
            .send(self.http.get(self.url("/api/businesses/categories")))
            .await?;
        Ok(list.categories)
    }

    pub async fn refresh_category(&self, category: BusinessCategory) -> Result<RefreshAck, ClientError> {
        self.send(
            self.http
                .post(self.url(&format!("/api/businesses/refresh/{}", category))),
        )
        .await
    }

    pub async fn business_stats(
        &self,
        category: Option<BusinessCategory>,
    ) -> Result<BusinessStats, ClientError> {
        let mut request = self.http.get(self.url("/api/businesses/stats"));
        if let Some(category) = category {
            request = request.query(&[("category", category.as_str())]);
        }
        self.send(request).await
    }

    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        self.send(self.http.get(self.url("/health"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_then_detail() {
        let status = StatusCode::NOT_FOUND;
        assert_eq!(
            error_message(status, r#"{"error":"Not Found","message":"Business 9 not found"}"#),
            "Business 9 not found"
        );
        assert_eq!(
            error_message(status, r#"{"detail":"Store not found"}"#),
            "Store not found"
        );
        assert_eq!(error_message(status, "  gateway down "), "gateway down");
        assert_eq!(error_message(status, ""), "Not Found");
    }

    #[test]
    fn test_error_display_is_human_readable() {
        let err = ClientError::Http {
            status: 404,
            message: "Business 9 not found".to_string(),
        };
        assert_eq!(err.to_string(), "Business 9 not found (HTTP 404)");
        assert!(err.is_not_found());
        assert_eq!(ClientError::Timeout.status(), None);
    }

    #[test]
    fn test_base_url_is_normalised() {
        let config = ClientConfig {
            api_base_url: "http://localhost:5000/".to_string(),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/health"), "http://localhost:5000/health");
    }
}
