use axum::routing::get;
use axum::Router;

use crate::handlers::library;
use crate::state::AppState;

/// Routes mounted at `/character-library`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(library::health))
}
