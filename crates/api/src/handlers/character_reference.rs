//! Handlers for image metadata under `/character-references`.

use axum::extract::{Path, State};
use nm_core::types::DbId;
use nm_db::models::image_metadata::CharacterImageMetadata;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/character-references/{id}/images
///
/// Newest first, including failed and orphaned rows.
pub async fn list_images(
    State(state): State<AppState>,
    Path(reference_id): Path<DbId>,
) -> AppResult<DataResponse<Vec<CharacterImageMetadata>>> {
    let images = state.library.list_images(reference_id).await?;
    Ok(DataResponse::ok(images))
}

/// GET /api/v1/character-references/{id}/images/{image_id}
pub async fn get_image(
    State(state): State<AppState>,
    Path((reference_id, image_id)): Path<(DbId, DbId)>,
) -> AppResult<DataResponse<CharacterImageMetadata>> {
    let image = state.library.get_image(reference_id, image_id).await?;
    Ok(DataResponse::ok(image))
}
