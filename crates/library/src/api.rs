//! REST API client for the character library service.
//!
//! Every call is bounded by the configured timeout. Non-2xx responses become
//! [`LibraryApiError::Api`] with the raw body. The client never retries;
//! that is the caller's decision.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::LibraryConfig;
use crate::messages::{
    id_string, ConsistencyReport, GeneratedImage, ProjectConsistencyRequest, RawImage,
    RemoteCharacter, RemoteCharacterPayload, SceneImageRequest, SmartImageRequest,
    TurnaroundRequest,
};

const CHARACTERS_PATH: &str = "/api/v1/characters";

/// Errors from the character library API layer.
#[derive(Debug, thiserror::Error)]
pub enum LibraryApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Character library API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// 2xx response carrying `success: false`.
    #[error("Character library rejected the request: {0}")]
    Rejected(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected character library response: {0}")]
    Decode(String),
}

impl LibraryApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LibraryApiError::Transport(e) if e.is_timeout())
    }

    /// Whether repeating the same call may succeed: transport failures,
    /// 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            LibraryApiError::Transport(_) => true,
            LibraryApiError::Api { status, .. } => *status >= 500 || *status == 429,
            LibraryApiError::Rejected(_) | LibraryApiError::Decode(_) => false,
        }
    }
}

/// Operations the orchestrators need from the remote service.
#[async_trait]
pub trait CharacterLibrary: Send + Sync {
    async fn create_character(
        &self,
        payload: &RemoteCharacterPayload,
    ) -> Result<RemoteCharacter, LibraryApiError>;

    /// `None` when the service answers 404.
    async fn find_character(&self, remote_id: &str) -> Result<Option<Value>, LibraryApiError>;

    /// A 404 counts as success: the entity is already gone.
    async fn delete_character(&self, remote_id: &str) -> Result<(), LibraryApiError>;

    async fn generate_initial_image(
        &self,
        remote_id: &str,
        prompt: &str,
    ) -> Result<GeneratedImage, LibraryApiError>;

    async fn generate_smart_image(
        &self,
        remote_id: &str,
        request: &SmartImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError>;

    async fn generate_core_set(&self, remote_id: &str)
        -> Result<Vec<GeneratedImage>, LibraryApiError>;

    /// Turnaround set: several views of the character in one call.
    async fn generate_360_set(
        &self,
        remote_id: &str,
        request: &TurnaroundRequest,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError>;

    async fn generate_scene_image(
        &self,
        remote_id: &str,
        request: &SceneImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError>;

    async fn validate_consistency(
        &self,
        remote_id: &str,
        image_id: &str,
    ) -> Result<ConsistencyReport, LibraryApiError>;

    async fn query_characters(&self, query: &str) -> Result<Value, LibraryApiError>;

    /// Project-wide consistency report. The body is passed through as-is.
    async fn validate_project_consistency(
        &self,
        request: &ProjectConsistencyRequest,
    ) -> Result<Value, LibraryApiError>;
}

/// HTTP client for the character library service.
#[derive(Debug, Clone)]
pub struct LibraryApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl LibraryApi {
    pub fn new(config: &LibraryConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config.base_url.clone(), config.timeout)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    // ---- private helpers ----

    fn character_url(&self, remote_id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}{CHARACTERS_PATH}/{remote_id}/{action}", self.base_url),
            None => format!("{}{CHARACTERS_PATH}/{remote_id}", self.base_url),
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        tracing::debug!(%method, %url, "Character library request");
        self.client.request(method, url).timeout(self.timeout)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: String,
        body: &B,
    ) -> Result<Value, LibraryApiError> {
        let response = self.request(Method::POST, url).json(body).send().await?;
        let response = Self::ensure_success(response).await?;
        unwrap_envelope(Self::parse_body(response).await?)
    }

    async fn post_image<B: Serialize + ?Sized>(
        &self,
        url: String,
        body: &B,
    ) -> Result<GeneratedImage, LibraryApiError> {
        image_from(self.post_json(url, body).await?)
    }

    /// Ensure the response has a success status code, otherwise return
    /// [`LibraryApiError::Api`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, LibraryApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LibraryApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read the body as JSON. An empty body is `null`.
    async fn parse_body(response: reqwest::Response) -> Result<Value, LibraryApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| LibraryApiError::Decode(format!("invalid JSON body: {e}")))
    }
}

#[async_trait]
impl CharacterLibrary for LibraryApi {
    async fn create_character(
        &self,
        payload: &RemoteCharacterPayload,
    ) -> Result<RemoteCharacter, LibraryApiError> {
        let url = format!("{}{CHARACTERS_PATH}", self.base_url);
        let value = self.post_json(url, payload).await?;
        let record = match value.get("doc") {
            Some(doc) if doc.is_object() => doc,
            _ => &value,
        };
        let character_id = record.get("characterId").and_then(id_string);
        let remote_id = record
            .get("id")
            .and_then(id_string)
            .or_else(|| character_id.clone())
            .ok_or_else(|| {
                LibraryApiError::Decode("create response carries no character id".into())
            })?;
        Ok(RemoteCharacter {
            remote_id,
            character_id,
        })
    }

    async fn find_character(&self, remote_id: &str) -> Result<Option<Value>, LibraryApiError> {
        let response = self
            .request(Method::GET, self.character_url(remote_id, None))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;
        unwrap_envelope(Self::parse_body(response).await?).map(Some)
    }

    async fn delete_character(&self, remote_id: &str) -> Result<(), LibraryApiError> {
        let response = self
            .request(Method::DELETE, self.character_url(remote_id, None))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(remote_id, "Remote character already deleted");
            return Ok(());
        }
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn generate_initial_image(
        &self,
        remote_id: &str,
        prompt: &str,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let url = self.character_url(remote_id, Some("generate-initial-image"));
        self.post_image(url, &json!({ "prompt": prompt })).await
    }

    async fn generate_smart_image(
        &self,
        remote_id: &str,
        request: &SmartImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let url = self.character_url(remote_id, Some("generate-smart-image"));
        self.post_image(url, request).await
    }

    async fn generate_core_set(
        &self,
        remote_id: &str,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError> {
        let url = self.character_url(remote_id, Some("generate-core-set"));
        images_from(self.post_json(url, &json!({})).await?, "core set")
    }

    async fn generate_360_set(
        &self,
        remote_id: &str,
        request: &TurnaroundRequest,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError> {
        let url = self.character_url(remote_id, Some("generate-360-set"));
        images_from(self.post_json(url, request).await?, "360 set")
    }

    async fn generate_scene_image(
        &self,
        remote_id: &str,
        request: &SceneImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let url = self.character_url(remote_id, Some("generate-scene-image"));
        self.post_image(url, request).await
    }

    async fn validate_consistency(
        &self,
        remote_id: &str,
        image_id: &str,
    ) -> Result<ConsistencyReport, LibraryApiError> {
        let url = self.character_url(remote_id, Some("validate-consistency"));
        let value = self.post_json(url, &json!({ "imageId": image_id })).await?;
        serde_json::from_value(value)
            .map_err(|e| LibraryApiError::Decode(format!("consistency report: {e}")))
    }

    async fn query_characters(&self, query: &str) -> Result<Value, LibraryApiError> {
        let url = format!("{}{CHARACTERS_PATH}/query", self.base_url);
        self.post_json(url, &json!({ "query": query })).await
    }

    async fn validate_project_consistency(
        &self,
        request: &ProjectConsistencyRequest,
    ) -> Result<Value, LibraryApiError> {
        let url = format!("{}{CHARACTERS_PATH}/validate-project-consistency", self.base_url);
        self.post_json(url, request).await
    }
}

/// Strip the `{success, data}` envelope if present. `success: false` is an
/// error even on a 2xx response.
fn unwrap_envelope(value: Value) -> Result<Value, LibraryApiError> {
    if value.get("success") == Some(&Value::Bool(false)) {
        let message = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        return Err(LibraryApiError::Rejected(message));
    }
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ (Value::Object(_) | Value::Array(_))) => Ok(data),
            Some(other) => {
                map.insert("data".to_string(), other);
                Ok(Value::Object(map))
            }
            None => Ok(Value::Object(map)),
        },
        other => Ok(other),
    }
}

/// Images of a multi-image response: a bare array or `{ images: [...] }`.
fn images_from(value: Value, what: &str) -> Result<Vec<GeneratedImage>, LibraryApiError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("images") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(LibraryApiError::Decode(format!(
                    "{what} response carries no images"
                )))
            }
        },
        _ => {
            return Err(LibraryApiError::Decode(format!(
                "{what} response is not an object"
            )))
        }
    };
    items.into_iter().map(image_from).collect()
}

fn image_from(value: Value) -> Result<GeneratedImage, LibraryApiError> {
    let raw: RawImage = serde_json::from_value(value)
        .map_err(|e| LibraryApiError::Decode(format!("image response: {e}")))?;
    raw.into_image()
        .ok_or_else(|| LibraryApiError::Decode("image response carries no image id".into()))
}
