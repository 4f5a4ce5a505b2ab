use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::{BoundingBox, BusinessCategory, NewBusiness};
use crate::osm::{elements_to_businesses, OverpassResponse};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Primary Overpass API endpoints with automatic fallback
const OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter", // Official main endpoint
    "https://overpass.private.coffee/api/interpreter", // Community mirror
    "https://maps.mail.ru/osm/tools/overpass/api/interpreter", // Mail.ru mirror
];

#[derive(Clone)]
pub struct OverpassClient {
    client: Client,
    endpoints: Vec<String>,
    current_endpoint_idx: Arc<AtomicUsize>,
    limit: usize,
    base_backoff_ms: u64,
}

impl OverpassClient {
    pub fn new() -> Self {
        Self::with_endpoints(OVERPASS_ENDPOINTS.iter().map(|s| s.to_string()).collect())
    }

    /// Single fixed endpoint, e.g. a self-hosted instance or a test server
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self::with_endpoints(vec![endpoint.into()])
    }

    fn with_endpoints(endpoints: Vec<String>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client ({}), using defaults", e);
                Client::new()
            });

        OverpassClient {
            client,
            endpoints,
            current_endpoint_idx: Arc::new(AtomicUsize::new(0)),
            limit: DEFAULT_INGEST_LIMIT,
            base_backoff_ms: 1000,
        }
    }

    /// Maximum records kept from one category fetch
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Base delay of the exponential retry backoff
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.base_backoff_ms = base.as_millis() as u64;
        self
    }

    /// Get the next endpoint to try (round-robin)
    fn get_next_endpoint(&self) -> String {
        let idx = self.current_endpoint_idx.fetch_add(1, Ordering::Relaxed);
        self.endpoints[idx % self.endpoints.len()].clone()
    }

    /// Fetch every named place of `category` inside `region`.
    pub async fn fetch_category(
        &self,
        category: BusinessCategory,
        region: &BoundingBox,
    ) -> Result<Vec<NewBusiness>> {
        let query = build_query(category, region);
        tracing::debug!("Overpass query for {}: {}", category, query);

        let response = self
            .execute_query_with_retry(&query, OVERPASS_RETRY_MAX_ATTEMPTS)
            .await?;

        let businesses =
            elements_to_businesses(&response.elements, category, region, self.limit);
        tracing::info!(
            "Overpass returned {} elements for {}, {} usable records",
            response.elements.len(),
            category,
            businesses.len()
        );
        Ok(businesses)
    }

    fn backoff(&self, retry_count: usize) -> Duration {
        let jitter = rand::random::<u64>() % OVERPASS_RETRY_JITTER_MS;
        let backoff_ms = self.base_backoff_ms * 2_u64.pow(retry_count as u32);
        Duration::from_millis(backoff_ms + jitter)
    }

    /// Execute query with exponential backoff on timeouts and rate limiting.
    /// `max_retries` of 2 means 3 total attempts.
    async fn execute_query_with_retry(
        &self,
        query: &str,
        max_retries: usize,
    ) -> Result<OverpassResponse> {
        let mut retry_count = 0;

        loop {
            let endpoint = self.get_next_endpoint();

            let response_result = self
                .client
                .post(&endpoint)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(format!("data={}", urlencoding::encode(query)))
                .timeout(Duration::from_secs(OVERPASS_QUERY_TIMEOUT_SECONDS))
                .send()
                .await;

            let response = match response_result {
                Ok(resp) => resp,
                Err(e) => {
                    let error_msg = if e.is_timeout() {
                        "Request timed out".to_string()
                    } else {
                        format!("Request failed: {}", e)
                    };

                    if retry_count < max_retries {
                        retry_count += 1;
                        let delay = self.backoff(retry_count);
                        tracing::warn!(
                            "Overpass {} ({}), retrying in {}ms (attempt {}/{})",
                            error_msg,
                            endpoint,
                            delay.as_millis(),
                            retry_count + 1,
                            max_retries + 1
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(AppError::OverpassApi(format!(
                        "{} after {} attempts",
                        error_msg,
                        max_retries + 1
                    )));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response.json::<OverpassResponse>().await.map_err(|e| {
                    AppError::OverpassApi(format!("Failed to parse response: {}", e))
                });
            }

            let is_retryable = status.as_u16() == OVERPASS_HTTP_TOO_MANY_REQUESTS
                || status.as_u16() == OVERPASS_HTTP_GATEWAY_TIMEOUT;

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if is_retryable && retry_count < max_retries {
                retry_count += 1;
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    "Overpass returned HTTP {}, retrying in {}ms (attempt {}/{})",
                    status,
                    delay.as_millis(),
                    retry_count + 1,
                    max_retries + 1
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(AppError::OverpassApi(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
    }
}

impl Default for OverpassClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Overpass QL union of the category's selectors, restricted to named
/// places inside `region`.
pub fn build_query(category: BusinessCategory, region: &BoundingBox) -> String {
    let bbox = region.to_overpass();
    let mut query_parts = vec![format!(
        "[out:json][timeout:{}];(",
        OVERPASS_QUERY_TIMEOUT_SECONDS
    )];

    for selector in category.overpass_selectors() {
        query_parts.push(format!(r#"nwr{}["name"]{};"#, selector, bbox));
    }

    query_parts.push(");out center;".to_string());
    query_parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        let region = BoundingBox::default_region();
        let query = build_query(BusinessCategory::Medical, &region);

        assert!(query.starts_with("[out:json][timeout:60];("));
        assert!(query.contains(r#"nwr["amenity"~"^(hospital|clinic|doctors)$"]["name"](35.8,14.18,35.95,14.58);"#));
        assert!(query.contains(r#"nwr["healthcare"]"#));
        assert!(query.ends_with(");out center;"));
    }

    #[test]
    fn test_every_category_builds_a_union() {
        let region = BoundingBox::default_region();
        for category in BusinessCategory::ALL {
            let query = build_query(category, &region);
            let statements = query.matches("nwr[").count();
            assert_eq!(statements, category.overpass_selectors().len());
        }
    }

    #[test]
    fn test_endpoint_round_robin() {
        let client = OverpassClient::new();
        let first = client.get_next_endpoint();
        let second = client.get_next_endpoint();
        assert_ne!(first, second);
        for _ in 0..OVERPASS_ENDPOINTS.len() - 2 {
            client.get_next_endpoint();
        }
        assert_eq!(client.get_next_endpoint(), first);
    }

    #[test]
    fn test_backoff_grows() {
        let client = OverpassClient::with_endpoint("http://localhost")
            .with_backoff(Duration::from_millis(100));
        let first = client.backoff(1);
        let second = client.backoff(2);
        assert!(first >= Duration::from_millis(200));
        assert!(first < Duration::from_millis(200 + OVERPASS_RETRY_JITTER_MS));
        assert!(second >= Duration::from_millis(400));
    }
}
