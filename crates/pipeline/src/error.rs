use nm_core::types::DbId;
use nm_library::LibraryApiError;

/// Errors surfaced by the orchestration layer.
///
/// Per-character sync failures and per-stage generation failures are
/// reported inside result structs, not through this type.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network failure or timeout talking to the character library.
    #[error("Character library unreachable: {0}")]
    Transport(String),

    /// The character library answered with an error.
    #[error("Character library error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// A quality or consistency gate was not met.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The operation needs state that is not there yet (e.g. a remote id).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<LibraryApiError> for PipelineError {
    fn from(err: LibraryApiError) -> Self {
        match err {
            LibraryApiError::Transport(e) => PipelineError::Transport(e.to_string()),
            LibraryApiError::Api { status, body } => PipelineError::Remote { status, body },
            // Both arrive on a 2xx response.
            LibraryApiError::Rejected(body) | LibraryApiError::Decode(body) => {
                PipelineError::Remote { status: 200, body }
            }
        }
    }
}
