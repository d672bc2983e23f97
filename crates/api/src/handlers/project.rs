use axum::extract::{Path, State};
use nm_core::types::DbId;
use nm_pipeline::sync::ProjectSyncResult;
use serde_json::Value;

use crate::error::AppResult;
use crate::response::{DataResponse, OutcomeResponse};
use crate::state::AppState;

/// POST /api/v1/projects/{id}/characters/sync
///
/// Answers 500 with the full result when any character failed.
pub async fn sync_characters(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<OutcomeResponse<ProjectSyncResult>> {
    let result = state.library.sync_project(project_id).await?;
    Ok(OutcomeResponse(result))
}

/// POST /api/v1/projects/{id}/validate-consistency
///
/// Relays the character library's project-wide consistency report.
pub async fn validate_consistency(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<DataResponse<Value>> {
    let report = state.library.validate_project_consistency(project_id).await?;
    Ok(DataResponse::ok(report))
}
