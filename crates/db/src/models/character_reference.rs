//! Character reference model and DTOs.

use nm_core::prompt::CharacterProfile;
use nm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `character_references` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CharacterReference {
    pub id: DbId,
    pub character_id: Option<DbId>,
    pub project_id: DbId,
    pub name: String,
    #[sqlx(json)]
    pub profile: CharacterProfile,
    pub master_reference_url: Option<String>,
    pub core_set_generated: bool,
    pub core_set_count: i32,
    pub generation_status: Option<String>,
    pub last_image_update: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new character reference.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacterReference {
    pub character_id: Option<DbId>,
    pub project_id: DbId,
    pub name: String,
    #[serde(default)]
    pub profile: CharacterProfile,
}

/// Asset fields written at the end of a generation run.
///
/// `master_reference_url` is only overwritten when `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateLibraryAssets {
    pub master_reference_url: Option<String>,
    pub core_set_generated: bool,
    pub core_set_count: i32,
    pub generation_status: String,
    pub last_image_update: Timestamp,
}
