//! Integration tests for the health endpoints and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn health_check_returns_ok_without_database() {
    let test = build_test_app().await;

    let response = get(&test.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["db_healthy"].is_null());
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let test = build_test_app().await;

    let response = get(&test.app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let test = build_test_app().await;

    let response = get(&test.app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn library_health_reports_healthy_service() {
    let test = build_test_app().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&test.server)
        .await;

    let response = get(&test.app, "/api/v1/character-library/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["isHealthy"], true);
    assert!(json["data"]["responseTimeMs"].is_u64());
}

#[tokio::test]
async fn library_health_failure_is_reported_not_raised() {
    let test = build_test_app().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&test.server)
        .await;

    let response = get(&test.app, "/api/v1/character-library/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["isHealthy"], false);
    assert_eq!(json["data"]["error"], "health endpoint returned HTTP 503");
}
