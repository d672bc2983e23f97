//! Request and response types for the character library HTTP API.
//!
//! Requests serialize to camelCase. Responses are normalised from the
//! several shapes the service returns (flat, or wrapped in `data`) into the
//! small structs the pipeline works with.

use nm_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/* --------------------------------------------------------------------------
Requests
-------------------------------------------------------------------------- */

/// Body of `POST /api/v1/characters`, derived entirely from local state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCharacterPayload {
    pub name: String,
    /// External slug, unique per create.
    pub character_id: String,
    pub status: &'static str,
    pub biography: Value,
    pub personality: Value,
    pub physical_description: Value,
    pub clothing: Value,
    pub age: Option<u32>,
    pub height: String,
    pub eye_color: String,
    pub hair_color: String,
    pub novel_movie_integration: NovelMovieIntegration,
}

/// Back-link block the service stores on the remote character.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelMovieIntegration {
    pub project_id: String,
    pub sync_status: &'static str,
    pub last_sync_at: Timestamp,
}

/// Wrap plain text in the single-paragraph rich-text document the service
/// expects for long-form fields.
pub fn rich_text(text: &str) -> Value {
    json!({
        "root": {
            "type": "root",
            "direction": "ltr",
            "format": "",
            "indent": 0,
            "version": 1,
            "children": [{
                "type": "paragraph",
                "direction": "ltr",
                "format": "",
                "indent": 0,
                "version": 1,
                "children": [{
                    "type": "text",
                    "detail": 0,
                    "format": 0,
                    "mode": "normal",
                    "style": "",
                    "text": text,
                    "version": 1,
                }],
            }],
        }
    })
}

/// Build the external character slug: `{project}-{name}-{character}-{millis}`.
///
/// The name part is lowercased, reduced to `[a-z0-9-]` and capped at 20
/// characters.
pub fn character_slug(project_id: i64, character_id: i64, name: &str, at: Timestamp) -> String {
    let mut slug = String::new();
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.chars().take(20).collect();
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "character" } else { slug };
    format!(
        "{project_id}-{slug}-{character_id}-{}",
        at.timestamp_millis()
    )
}

/// Body of `POST .../generate-smart-image`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Body of `POST .../generate-360-set`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnaroundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<u32>,
}

/// Body of `POST /api/v1/characters/validate-project-consistency`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConsistencyRequest {
    pub project_id: String,
    pub include_visual_validation: bool,
    pub include_narrative_validation: bool,
    pub include_relationship_validation: bool,
    pub quality_threshold: f64,
    pub consistency_threshold: f64,
}

impl ProjectConsistencyRequest {
    /// Full validation of a project against the given gate thresholds.
    pub fn full(project_id: i64, quality_threshold: f64, consistency_threshold: f64) -> Self {
        Self {
            project_id: project_id.to_string(),
            include_visual_validation: true,
            include_narrative_validation: true,
            include_relationship_validation: true,
            quality_threshold,
            consistency_threshold,
        }
    }
}

/// Scene description supplied by the caller of scene-image generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneContext {
    pub description: String,
    #[serde(default)]
    pub scene_type: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub lighting: Option<String>,
}

/// Body of `POST .../generate-scene-image`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneImageRequest {
    pub scene_context: String,
    pub scene_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting_style: Option<String>,
}

impl From<&SceneContext> for SceneImageRequest {
    fn from(ctx: &SceneContext) -> Self {
        Self {
            scene_context: ctx.description.clone(),
            scene_type: ctx
                .scene_type
                .clone()
                .unwrap_or_else(|| "dialogue".to_string()),
            mood: ctx.mood.clone(),
            lighting_style: ctx.lighting.clone(),
        }
    }
}

/* --------------------------------------------------------------------------
Responses
-------------------------------------------------------------------------- */

/// The remote entity created by `POST /api/v1/characters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCharacter {
    /// Opaque remote id. Never parsed.
    pub remote_id: String,
    pub character_id: Option<String>,
}

/// One generated image as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_id: String,
    pub url: Option<String>,
    pub quality_score: Option<f64>,
    pub consistency_score: Option<f64>,
}

/// Result of `POST .../validate-consistency` for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    #[serde(default, alias = "score")]
    pub consistency_score: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub is_consistent: Option<bool>,
}

/// Loosely-typed image record; the service has used several field names.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawImage {
    #[serde(default)]
    image_id: Option<Value>,
    #[serde(default)]
    dino_asset_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    public_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    quality_score: Option<f64>,
    #[serde(default)]
    consistency_score: Option<f64>,
}

impl RawImage {
    /// Normalise into a [`GeneratedImage`]. `None` when no id is present.
    pub(crate) fn into_image(self) -> Option<GeneratedImage> {
        let image_id = [self.image_id, self.dino_asset_id, self.id]
            .into_iter()
            .flatten()
            .find_map(|v| id_string(&v))?;
        Some(GeneratedImage {
            image_id,
            url: self.public_url.or(self.url).or(self.image_url),
            quality_score: self.quality_score,
            consistency_score: self.consistency_score,
        })
    }
}

/// Ids arrive as strings or numbers; both are kept as opaque strings.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
