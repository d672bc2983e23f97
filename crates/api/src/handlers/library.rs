use axum::extract::State;
use nm_library::HealthResult;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/character-library/health
///
/// Always 200; reachability is reported in the body.
pub async fn health(State(state): State<AppState>) -> DataResponse<HealthResult> {
    let result = state.library.check_health().await;
    if !result.is_healthy {
        tracing::warn!(error = ?result.error, "Character library health check failed");
    }
    DataResponse::ok(result)
}
