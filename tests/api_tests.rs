use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bizmap::models::BusinessCategory;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = common::setup_test_app().await;

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "bizmap-api");
    assert_eq!(json["checks"]["database"], "ok");
    assert_eq!(json["checks"]["ingest_cache"]["backend"], "memory");
}

#[tokio::test]
async fn test_index_lists_endpoints() {
    let (app, _) = common::setup_test_app().await;
    let (status, json) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.to_string().contains("/api/businesses"));
}

#[tokio::test]
async fn test_store_crud_round() {
    let (app, _) = common::setup_test_app().await;

    let payload = json!({
        "place_id": "osm_node_1",
        "name": "Pama Supermarket",
        "latitude": 35.8850,
        "longitude": 14.4700,
        "category": "grocery",
        "formatted_address": "Triq il-Mosta, Mosta"
    });
    let (status, created) = send_json(&app, "POST", "/api/stores", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["name"], "Pama Supermarket");

    // Same external reference twice
    let (status, json) = send_json(&app, "POST", "/api/stores", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Conflict");

    let (status, fetched) = get(&app, &format!("/api/stores/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["place_id"], "osm_node_1");

    let (status, updated) = send_json(
        &app,
        "PUT",
        &format!("/api/stores/{}", id),
        json!({ "rating": 4.5, "phone_number": "+356 2141 0000" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["rating"], 4.5);
    assert_eq!(updated["name"], "Pama Supermarket");

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/stores/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], format!("Store {} deleted", id));

    let (status, json) = get(&app, &format!("/api/stores/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_create_store_validation() {
    let (app, _) = common::setup_test_app().await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/stores",
        json!({
            "place_id": "osm_node_2",
            "name": "Nowhere",
            "latitude": 123.0,
            "longitude": 14.47
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_stores_pagination() {
    let (app, directory) = common::setup_test_app().await;
    for i in 0..7 {
        directory
            .create(&common::new_business(
                &format!("osm_node_{}", i),
                &format!("Store {}", i),
                BusinessCategory::Grocery,
                35.88,
                14.47,
            ))
            .await
            .unwrap();
    }
    directory
        .create(&common::new_business(
            "osm_node_99",
            "Chemist",
            BusinessCategory::Pharmacy,
            35.88,
            14.47,
        ))
        .await
        .unwrap();

    let (status, first) = get(&app, "/api/stores?skip=0&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["stores"].as_array().unwrap().len(), 5);
    assert_eq!(first["total"], 7);
    assert_eq!(first["has_more"], true);

    let (_, second) = get(&app, "/api/stores?skip=5&limit=5").await;
    assert_eq!(second["stores"].as_array().unwrap().len(), 2);
    assert_eq!(second["has_more"], false);
}

#[tokio::test]
async fn test_search_lidl_in_grocery() {
    let (app, directory) = common::setup_test_app().await;

    let mut by_address = common::new_business(
        "osm_way_3",
        "Discount Market",
        BusinessCategory::Grocery,
        35.87,
        14.45,
    );
    by_address.formatted_address = Some("Next to LIDL, Qormi".to_string());

    for record in [
        common::new_business("osm_node_1", "Lidl Qormi", BusinessCategory::Grocery, 35.87, 14.47),
        common::new_business("osm_node_2", "LIDL Pharmacy Corner", BusinessCategory::Pharmacy, 35.87, 14.47),
        common::new_business("osm_node_4", "Welbee's", BusinessCategory::Grocery, 35.91, 14.49),
        by_address,
    ] {
        directory.create(&record).await.unwrap();
    }

    let (status, json) = get(&app, "/api/businesses?query=lidl&category=grocery").await;
    assert_eq!(status, StatusCode::OK);

    let mut found = names(&json["businesses"]);
    found.sort();
    assert_eq!(found, vec!["Discount Market", "Lidl Qormi"]);
    assert_eq!(json["total"], 2);
    assert_eq!(json["category"], "grocery");
    for business in json["businesses"].as_array().unwrap() {
        assert_eq!(business["category"], "grocery");
    }
}

#[tokio::test]
async fn test_blank_filters_are_ignored() {
    let (app, directory) = common::setup_test_app().await;
    directory
        .create(&common::new_business("osm_node_1", "Lidl", BusinessCategory::Grocery, 35.87, 14.47))
        .await
        .unwrap();

    let (status, json) = get(&app, "/api/stores/search?query=&min_rating=&latitude=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn test_nearby_stores_sorted_by_distance() {
    let (app, directory) = common::setup_test_app().await;
    let valletta = (35.8989, 14.5146);

    for (place_id, name, lat, lng) in [
        ("osm_node_1", "Far", 35.9500, 14.4000),
        ("osm_node_2", "Close", 35.8995, 14.5150),
        ("osm_node_3", "Middle", 35.9100, 14.5000),
    ] {
        directory
            .create(&common::new_business(place_id, name, BusinessCategory::Grocery, lat, lng))
            .await
            .unwrap();
    }

    let uri = format!(
        "/api/stores/nearby?latitude={}&longitude={}&radius=5000",
        valletta.0, valletta.1
    );
    let (status, json) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&json), vec!["Close", "Middle"]);
    assert!(json[0]["distance_km"].as_f64().unwrap() < json[1]["distance_km"].as_f64().unwrap());

    let (status, _) = get(&app, "/api/stores/nearby?longitude=14.5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_businesses_nearby_mode() {
    let (app, directory) = common::setup_test_app().await;
    for i in 0..5 {
        directory
            .create(&common::new_business(
                &format!("osm_node_{}", i),
                &format!("Clinic {}", i),
                BusinessCategory::Medical,
                35.8989 + i as f64 * 0.001,
                14.5146,
            ))
            .await
            .unwrap();
    }

    let (status, json) = get(
        &app,
        "/api/businesses?latitude=35.8989&longitude=14.5146&radius=2000&limit=3",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&json["businesses"]), vec!["Clinic 0", "Clinic 1", "Clinic 2"]);
    assert_eq!(json["has_more"], false);
    assert_eq!(json["limit"], 3);
}

#[tokio::test]
async fn test_businesses_rejects_out_of_range_parameters() {
    let (app, _) = common::setup_test_app().await;

    for uri in [
        "/api/businesses?limit=500",
        "/api/businesses?limit=0",
        "/api/businesses?min_rating=7",
        "/api/businesses?max_price_level=9",
        "/api/businesses?latitude=35.9&longitude=14.5&radius=10",
    ] {
        let (status, json) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json["error"], "Bad Request", "{}", uri);
    }
}

#[tokio::test]
async fn test_categories_include_empty_ones() {
    let (app, directory) = common::setup_test_app().await;
    directory
        .create(&common::new_business("osm_node_1", "Mater Dei", BusinessCategory::Medical, 35.90, 14.48))
        .await
        .unwrap();

    let (status, json) = get(&app, "/api/businesses/categories").await;
    assert_eq!(status, StatusCode::OK);

    let categories = json["categories"].as_array().unwrap();
    assert_eq!(categories.len(), BusinessCategory::ALL.len());
    let medical = categories.iter().find(|c| c["key"] == "medical").unwrap();
    assert_eq!(medical["count"], 1);
    assert!(medical["name"].is_string());
    assert!(medical["icon"].is_string());
    let religion = categories.iter().find(|c| c["key"] == "religion").unwrap();
    assert_eq!(religion["count"], 0);
}

#[tokio::test]
async fn test_refresh_endpoints_accept_in_background() {
    let (app, _) = common::setup_test_app().await;

    let (status, json) = send_json(&app, "POST", "/api/stores/refresh", json!({ "force_refresh": true })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "started");
    assert_eq!(json["category"], "grocery");
    assert!(json["message"].as_str().unwrap().contains("Forced"));

    // Body is optional
    let request = Request::builder()
        .method("POST")
        .uri("/api/stores/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/businesses/refresh/pharmacy")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["category"], "pharmacy");

    let request = Request::builder()
        .method("POST")
        .uri("/api/businesses/refresh/bakery")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_endpoints() {
    let (app, directory) = common::setup_test_app().await;

    let mut rated = common::new_business("osm_node_1", "Lidl", BusinessCategory::Grocery, 35.87, 14.47);
    rated.rating = Some(4.0);
    rated.website = Some("https://www.lidl.com.mt".to_string());
    directory.create(&rated).await.unwrap();
    directory
        .create(&common::new_business("osm_node_2", "Corner Shop", BusinessCategory::Grocery, 35.88, 14.47))
        .await
        .unwrap();
    directory
        .create(&common::new_business("osm_node_3", "Chemist", BusinessCategory::Pharmacy, 35.88, 14.47))
        .await
        .unwrap();

    let (status, json) = get(&app, "/api/stores/stats/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_stores"], 2);
    assert_eq!(json["stores_with_ratings"], 1);
    assert_eq!(json["coverage_percentage"], 50.0);

    let (status, json) = get(&app, "/api/businesses/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_businesses"], 3);
    assert_eq!(json["businesses_with_website"], 1);
    assert_eq!(json["categories"]["grocery"], 2);

    let (_, json) = get(&app, "/api/businesses/stats?category=pharmacy").await;
    assert_eq!(json["total_businesses"], 1);

    let (status, _) = get(&app, "/api/businesses/stats?category=bakery").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_business_not_found() {
    let (app, _) = common::setup_test_app().await;
    let (status, json) = get(&app, "/api/businesses/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Not Found");
}
