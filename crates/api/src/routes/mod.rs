pub mod character;
pub mod character_reference;
pub mod health;
pub mod library;
pub mod project;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /character-library/health                        library reachability
///
/// /characters/{id}                                 delete
/// /characters/{id}/sync                            sync to library (POST)
/// /characters/{id}/regenerate                      full image pipeline (POST)
/// /characters/{id}/scene-image                     gated scene image (POST)
/// /characters/{id}/generate-initial-image          reference image only (POST)
/// /characters/{id}/generate-360-set                gated turnaround set (POST)
/// /characters/{id}/initial-image-prompt            reference prompt preview
///
/// /projects/{id}/characters/sync                   sync every character (POST)
/// /projects/{id}/validate-consistency              project consistency report (POST)
///
/// /character-references/{id}/images                image metadata, newest first
/// /character-references/{id}/images/{image_id}     one metadata row
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/character-library", library::router())
        .nest("/characters", character::router())
        .nest("/projects", project::router())
        .nest("/character-references", character_reference::router())
}
