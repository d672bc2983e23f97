use std::sync::Arc;

use nm_pipeline::CharacterLibraryService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool. `None` when the service runs on the in-memory store.
    pub pool: Option<nm_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Sync, generation and image metadata operations.
    pub library: Arc<CharacterLibraryService>,
}
