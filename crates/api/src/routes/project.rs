use axum::routing::post;
use axum::Router;

use crate::handlers::project;
use crate::state::AppState;

/// Routes mounted at `/projects`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/characters/sync", post(project::sync_characters))
        .route(
            "/{id}/validate-consistency",
            post(project::validate_consistency),
        )
}
