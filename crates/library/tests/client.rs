//! HTTP-level tests for `LibraryApi` and `HealthMonitor` against a mock server.

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use nm_library::messages::{
    rich_text, NovelMovieIntegration, ProjectConsistencyRequest, RemoteCharacterPayload,
    TurnaroundRequest,
};
use nm_library::{CharacterLibrary, HealthMonitor, LibraryApi, LibraryApiError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> LibraryApi {
    LibraryApi::with_client(reqwest::Client::new(), server.uri(), Duration::from_secs(5))
}

fn payload() -> RemoteCharacterPayload {
    RemoteCharacterPayload {
        name: "Mara".into(),
        character_id: "1-mara-7-0".into(),
        status: "in_development",
        biography: rich_text(""),
        personality: rich_text("guarded"),
        physical_description: rich_text(""),
        clothing: rich_text(""),
        age: Some(34),
        height: String::new(),
        eye_color: String::new(),
        hair_color: String::new(),
        novel_movie_integration: NovelMovieIntegration {
            project_id: "1".into(),
            sync_status: "synced",
            last_sync_at: Utc::now(),
        },
    }
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_character_returns_remote_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "created",
            "doc": { "id": "rc-1", "characterId": "1-mara-7-0" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = api(&server).create_character(&payload()).await.unwrap();
    assert_eq!(created.remote_id, "rc-1");
    assert_eq!(created.character_id.as_deref(), Some("1-mara-7-0"));
}

#[tokio::test]
async fn non_2xx_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters"))
        .respond_with(ResponseTemplate::new(422).set_body_string("name is required"))
        .mount(&server)
        .await;

    let err = api(&server).create_character(&payload()).await.unwrap_err();
    assert_matches!(
        err,
        LibraryApiError::Api { status: 422, ref body } if body == "name is required"
    );
}

#[tokio::test]
async fn client_does_not_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/generate-initial-image"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .generate_initial_image("rc-1", "portrait")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/characters/rc-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "rc-1" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client =
        LibraryApi::with_client(reqwest::Client::new(), server.uri(), Duration::from_millis(50));
    let err = client.find_character("rc-1").await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn find_missing_character_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/characters/rc-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(api(&server).find_character("rc-gone").await.unwrap(), None);
}

#[tokio::test]
async fn delete_treats_404_as_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/characters/rc-gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    api(&server).delete_character("rc-gone").await.unwrap();
}

#[tokio::test]
async fn query_posts_search_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/query"))
        .and(body_json(json!({ "query": "silver-haired detective" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "id": "rc-1", "name": "Mara" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = api(&server)
        .query_characters("silver-haired detective")
        .await
        .unwrap();
    assert_eq!(found, json!([{ "id": "rc-1", "name": "Mara" }]));
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initial_image_sends_prompt_and_normalises_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/generate-initial-image"))
        .and(body_json(json!({ "prompt": "studio portrait" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "dinoAssetId": "asset-9", "publicUrl": "https://cdn/a.png", "qualityScore": 90 }
        })))
        .mount(&server)
        .await;

    let image = api(&server)
        .generate_initial_image("rc-1", "studio portrait")
        .await
        .unwrap();
    assert_eq!(image.image_id, "asset-9");
    assert_eq!(image.url.as_deref(), Some("https://cdn/a.png"));
    assert_eq!(image.quality_score, Some(90.0));
}

#[tokio::test]
async fn success_false_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/generate-core-set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "no master reference"
        })))
        .mount(&server)
        .await;

    let err = api(&server).generate_core_set("rc-1").await.unwrap_err();
    assert_matches!(err, LibraryApiError::Rejected(ref m) if m == "no master reference");
}

#[tokio::test]
async fn core_set_parses_every_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/generate-core-set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "images": [ { "imageId": "c1" }, { "imageId": "c2", "url": "u2" } ] }
        })))
        .mount(&server)
        .await;

    let images = api(&server).generate_core_set("rc-1").await.unwrap();
    let ids: Vec<_> = images.iter().map(|i| i.image_id.as_str()).collect();
    assert_eq!(ids, ["c1", "c2"]);
}

#[tokio::test]
async fn turnaround_set_sends_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/generate-360-set"))
        .and(body_json(json!({
            "style": "character_turnaround",
            "qualityThreshold": 70.0,
            "imageCount": 8
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "images": [ { "imageId": "t1", "publicUrl": "https://cdn/t1.png" }, { "imageId": "t2" } ]
        })))
        .mount(&server)
        .await;

    let request = TurnaroundRequest {
        style: Some("character_turnaround".into()),
        quality_threshold: Some(70.0),
        image_count: Some(8),
    };
    let images = api(&server).generate_360_set("rc-1", &request).await.unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].url.as_deref(), Some("https://cdn/t1.png"));
}

#[tokio::test]
async fn project_consistency_posts_thresholds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/validate-project-consistency"))
        .and(body_json(json!({
            "projectId": "7",
            "includeVisualValidation": true,
            "includeNarrativeValidation": true,
            "includeRelationshipValidation": true,
            "qualityThreshold": 70.0,
            "consistencyThreshold": 85.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "overallScore": 88, "issues": [] }
        })))
        .mount(&server)
        .await;

    let report = api(&server)
        .validate_project_consistency(&ProjectConsistencyRequest::full(7, 70.0, 85.0))
        .await
        .unwrap();
    assert_eq!(report["overallScore"], 88);
}

#[tokio::test]
async fn validate_consistency_reads_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/characters/rc-1/validate-consistency"))
        .and(body_json(json!({ "imageId": "img-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "consistencyScore": 91.5,
            "qualityScore": 80
        })))
        .mount(&server)
        .await;

    let report = api(&server)
        .validate_consistency("rc-1", "img-1")
        .await
        .unwrap();
    assert_eq!(report.consistency_score, Some(91.5));
    assert_eq!(report.quality_score, Some(80.0));
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

fn monitor(uri: String) -> HealthMonitor {
    HealthMonitor::with_client(reqwest::Client::new(), uri, Duration::from_millis(500))
}

#[tokio::test]
async fn health_ok_is_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let result = monitor(server.uri()).check().await;
    assert!(result.is_healthy);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn health_with_degraded_status_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "degraded" })))
        .mount(&server)
        .await;

    let result = monitor(server.uri()).check().await;
    assert!(!result.is_healthy);
    assert_eq!(result.error.as_deref(), Some("health status is 'degraded'"));
}

#[tokio::test]
async fn health_5xx_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = monitor(server.uri()).check().await;
    assert!(!result.is_healthy);
    assert_eq!(result.error.as_deref(), Some("health endpoint returned HTTP 500"));
}

#[tokio::test]
async fn unreachable_service_still_resolves() {
    // Nothing listens on port 9 (discard) on test hosts.
    let result = monitor("http://127.0.0.1:9".to_string()).check().await;
    assert!(!result.is_healthy);
    assert!(result.error.is_some());
}
