//! Handlers for the `/characters` resource.
//!
//! Sync and regeneration report failure inside their result, so those
//! handlers answer through [`OutcomeResponse`].

use axum::extract::{Path, State};
use axum::Json;
use nm_core::types::DbId;
use nm_library::messages::SceneContext;
use nm_pipeline::generation::{GenerationResult, StageOutcome};
use nm_pipeline::sync::{DeleteOutcome, SyncResult};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::{DataResponse, OutcomeResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InitialImagePrompt {
    pub prompt: String,
}

/// Optional body of the standalone initial-image call.
#[derive(Debug, Default, Deserialize)]
pub struct InitialImageRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /api/v1/characters/{id}/sync
pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> OutcomeResponse<SyncResult> {
    OutcomeResponse(state.library.sync_character(id).await)
}

/// DELETE /api/v1/characters/{id}
///
/// Removes the remote entity on a best-effort basis and orphans the
/// character's image metadata.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<DataResponse<DeleteOutcome>> {
    let outcome = state.library.delete_character(id).await?;
    Ok(DataResponse::ok(outcome))
}

/// POST /api/v1/characters/{id}/regenerate
pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<OutcomeResponse<GenerationResult>> {
    let result = state.library.regenerate(id).await?;
    Ok(OutcomeResponse(result))
}

/// POST /api/v1/characters/{id}/scene-image
pub async fn scene_image(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(context): Json<SceneContext>,
) -> AppResult<OutcomeResponse<StageOutcome>> {
    let outcome = state.library.generate_scene_image(id, &context).await?;
    Ok(OutcomeResponse(outcome))
}

/// POST /api/v1/characters/{id}/generate-initial-image
///
/// Accepts an optional `{ "prompt": "..." }` body overriding the prompt
/// built from the character profile.
pub async fn generate_initial_image(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<InitialImageRequest>>,
) -> AppResult<OutcomeResponse<StageOutcome>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state
        .library
        .generate_initial_image(id, request.prompt.as_deref())
        .await?;
    Ok(OutcomeResponse(outcome))
}

/// POST /api/v1/characters/{id}/generate-360-set
pub async fn generate_360_set(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<OutcomeResponse<StageOutcome>> {
    let outcome = state.library.generate_360_set(id).await?;
    Ok(OutcomeResponse(outcome))
}

/// GET /api/v1/characters/{id}/initial-image-prompt
pub async fn initial_image_prompt(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<DataResponse<InitialImagePrompt>> {
    let prompt = state.library.initial_image_prompt(id).await?;
    Ok(DataResponse::ok(InitialImagePrompt { prompt }))
}
