use bizmap::client::{ApiClient, ClientError};
use bizmap::config::ClientConfig;
use bizmap::models::{BusinessCategory, BusinessUpdate, Coordinates, SearchFilters};
use bizmap::AppState;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn client_for(base_url: &str) -> ApiClient {
    let config = ClientConfig {
        api_base_url: base_url.to_string(),
        request_timeout_secs: 1,
        ..ClientConfig::default()
    };
    ApiClient::new(&config).unwrap()
}

fn store_list(ids: std::ops::Range<i64>, total: u64, offset: u32) -> serde_json::Value {
    let stores = common::businesses(ids, BusinessCategory::Grocery);
    json!({
        "stores": stores,
        "total": total,
        "limit": 50,
        "offset": offset,
        "has_more": offset as u64 + (stores.len() as u64) < total,
    })
}

#[tokio::test]
async fn test_search_omits_unset_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stores/search"))
        .and(query_param("query", "lidl"))
        .and(query_param("category", "grocery"))
        .and(query_param("offset", "0"))
        .and(query_param_is_missing("min_rating"))
        .and(query_param_is_missing("latitude"))
        .and(query_param_is_missing("max_price_level"))
        .respond_with(ResponseTemplate::new(200).set_body_json(store_list(1..3, 2, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let filters = SearchFilters::default()
        .with_query("  lidl ")
        .with_category(BusinessCategory::Grocery);

    let page = client.search_stores(&filters).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_http_error_carries_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stores/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "Not Found",
            "message": "Business 9 not found"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server.uri()).get_store(9).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err,
        ClientError::Http {
            status: 404,
            message: "Business 9 not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_unauthorized_clears_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stores/stats/overview"))
        .and(header("authorization", "Bearer expired-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client.set_credential("expired-token").await;

    let err = client.store_stats().await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Unauthorized {
            message: "Token expired".to_string()
        }
    );
    assert_eq!(client.credential().await, None);
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/businesses/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server.uri()).categories().await.unwrap_err();
    assert!(matches!(err, ClientError::Malformed(_)));
    assert!(err.to_string().starts_with("Unexpected response from server"));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let err = client_for("http://127.0.0.1:9").health().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "got {:?}", err);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = client_for(&server.uri()).health().await.unwrap_err();
    assert_eq!(err, ClientError::Timeout);
}

#[tokio::test]
async fn test_refresh_sends_force_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stores/refresh"))
        .and(body_json(json!({ "force_refresh": true })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "status": "started",
            "message": "Forced refresh of grocery data started in background"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client_for(&server.uri()).refresh_stores(true).await.unwrap();
    assert_eq!(ack.status, "started");
    assert_eq!(ack.job_id, None);
}

#[tokio::test]
async fn test_client_against_live_router() {
    let directory = common::setup_directory().await;
    let app = bizmap::routes::create_router(Arc::new(AppState {
        directory: directory.clone(),
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = client_for(&format!("http://{}/", addr));
    assert_eq!(client.health().await.unwrap().status, "healthy");

    let created = client
        .create_store(&common::new_business(
            "osm_node_7",
            "Lidl Mosta",
            BusinessCategory::Grocery,
            35.9095,
            14.4256,
        ))
        .await
        .unwrap();

    let update = BusinessUpdate {
        rating: Some(4.2),
        ..Default::default()
    };
    let updated = client.update_store(created.id, &update).await.unwrap();
    assert_eq!(updated.rating, Some(4.2));

    let nearby = client
        .nearby_stores(Coordinates::new(35.9090, 14.4250).unwrap(), 1_000.0, 10)
        .await
        .unwrap();
    assert_eq!(nearby.len(), 1);
    assert!(nearby[0].distance_km.is_some());

    let page = client.list_stores(0, 10).await.unwrap();
    assert_eq!(page.total, 1);

    let stats = client.business_stats(Some(BusinessCategory::Grocery)).await.unwrap();
    assert_eq!(stats.total_businesses, 1);

    let message = client.delete_store(created.id).await.unwrap();
    assert_eq!(message, format!("Store {} deleted", created.id));
    assert!(client.get_business(created.id).await.unwrap_err().is_not_found());
}
