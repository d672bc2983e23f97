//! Character model, its library-integration block, and DTOs.

use nm_core::library::SyncStatus;
use nm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/* --------------------------------------------------------------------------
Character
-------------------------------------------------------------------------- */

/// A row from the `characters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Character {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub role: String,
    pub library_remote_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub library_sync_status: SyncStatus,
    pub library_last_synced_at: Option<Timestamp>,
    pub library_last_error: Option<String>,
    /// Deprecated mirror of `library_remote_id`.
    pub character_library_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Character {
    /// The remote entity this character is linked to. Rows written before
    /// `library_remote_id` existed carry only the legacy column.
    pub fn linked_remote_id(&self) -> Option<&str> {
        self.library_remote_id
            .as_deref()
            .or(self.character_library_id.as_deref())
    }

    /// Snapshot of the library-integration columns.
    pub fn library_integration(&self) -> LibraryIntegration {
        LibraryIntegration {
            remote_id: self.linked_remote_id().map(str::to_string),
            sync_status: self.library_sync_status,
            last_synced_at: self.library_last_synced_at,
            last_error: self.library_last_error.clone(),
        }
    }
}

/// DTO for creating a new character.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacter {
    pub project_id: DbId,
    pub name: String,
    pub role: Option<String>,
}

/* --------------------------------------------------------------------------
Library integration
-------------------------------------------------------------------------- */

/// The full library-integration block. Written as a unit by the sync
/// pipeline; `character_library_id` is set to the same value as `remote_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryIntegration {
    pub remote_id: Option<String>,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl Default for LibraryIntegration {
    fn default() -> Self {
        Self {
            remote_id: None,
            sync_status: SyncStatus::Unsynced,
            last_synced_at: None,
            last_error: None,
        }
    }
}
