use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::character;
use crate::state::AppState;

/// Routes mounted at `/characters`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", delete(character::delete))
        .route("/{id}/sync", post(character::sync))
        .route("/{id}/regenerate", post(character::regenerate))
        .route("/{id}/scene-image", post(character::scene_image))
        .route(
            "/{id}/generate-initial-image",
            post(character::generate_initial_image),
        )
        .route("/{id}/generate-360-set", post(character::generate_360_set))
        .route(
            "/{id}/initial-image-prompt",
            get(character::initial_image_prompt),
        )
}
