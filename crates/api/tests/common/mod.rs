#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use nm_api::config::ServerConfig;
use nm_api::router::build_app_router;
use nm_api::state::AppState;
use nm_core::prompt::CharacterProfile;
use nm_core::types::DbId;
use nm_db::memory::InMemoryStore;
use nm_db::models::character::{Character, CreateCharacter};
use nm_db::models::character_reference::{CharacterReference, CreateCharacterReference};
use nm_library::LibraryConfig;
use nm_pipeline::CharacterLibraryService;
use tower::ServiceExt;
use wiremock::MockServer;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
    }
}

/// Library config pointed at the mock server, with no backoff sleeps.
pub fn library_config(server: &MockServer) -> LibraryConfig {
    LibraryConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        health_timeout: Duration::from_secs(2),
        retry_base_delay: Duration::ZERO,
        ..LibraryConfig::default()
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
    /// Stands in for the character library service.
    pub server: MockServer,
}

/// Build the full application on the in-memory store, talking to a fresh
/// mock character library over HTTP.
pub async fn build_test_app() -> TestApp {
    let server = MockServer::start().await;
    let store = Arc::new(InMemoryStore::new());
    let library = CharacterLibraryService::from_config(
        &library_config(&server),
        store.clone(),
        store.clone(),
    );

    let config = test_config();
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        library: Arc::new(library),
    };

    TestApp {
        app: build_app_router(state, &config),
        store,
        server,
    }
}

pub async fn seed_character(
    store: &InMemoryStore,
    project_id: DbId,
    name: &str,
) -> (Character, CharacterReference) {
    let character = store
        .insert_character(CreateCharacter {
            project_id,
            name: name.to_string(),
            role: Some("lead".to_string()),
        })
        .await;
    let reference = store
        .insert_reference(CreateCharacterReference {
            character_id: Some(character.id),
            project_id,
            name: name.to_string(),
            profile: CharacterProfile {
                hair: Some("short silver hair".into()),
                ..Default::default()
            },
        })
        .await;
    (character, reference)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post(app: &Router, uri: &str) -> Response {
    send(app, Method::POST, uri, Body::empty()).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, Body::empty()).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
