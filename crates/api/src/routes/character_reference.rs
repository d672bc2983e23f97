use axum::routing::get;
use axum::Router;

use crate::handlers::character_reference;
use crate::state::AppState;

/// Routes mounted at `/character-references`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/images", get(character_reference::list_images))
        .route(
            "/{id}/images/{image_id}",
            get(character_reference::get_image),
        )
}
