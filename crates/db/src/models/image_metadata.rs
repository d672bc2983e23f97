//! Character image metadata model and DTOs.
//!
//! Rows are append-only evidence of generation attempts. The only
//! post-insert write is stamping `orphaned_at`.

use nm_core::library::{ImageKind, ImageStatus};
use nm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `character_image_metadata` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CharacterImageMetadata {
    pub id: DbId,
    pub character_reference_id: DbId,
    pub media_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub kind: ImageKind,
    pub provider: String,
    pub prompt: Option<String>,
    pub source_url: Option<String>,
    pub external_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ImageStatus,
    pub error: Option<String>,
    pub metrics: serde_json::Value,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub orphaned_at: Option<Timestamp>,
}

/// DTO for appending a metadata row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacterImageMetadata {
    pub character_reference_id: DbId,
    pub media_id: Option<DbId>,
    pub kind: ImageKind,
    pub provider: String,
    pub prompt: Option<String>,
    pub source_url: Option<String>,
    pub external_id: Option<String>,
    pub status: ImageStatus,
    pub error: Option<String>,
    pub metrics: serde_json::Value,
    pub created_by: Option<DbId>,
}
