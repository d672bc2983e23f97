//! Repository for the `characters` table.

use nm_core::types::DbId;
use sqlx::PgPool;

use crate::models::character::{Character, LibraryIntegration};

const COLUMNS: &str = "id, project_id, name, role, library_remote_id, library_sync_status, \
     library_last_synced_at, library_last_error, character_library_id, created_at, updated_at";

/// Reads and library-integration writes for characters. Rows are created
/// by the host application.
pub struct CharacterRepo;

impl CharacterRepo {
    /// Find a character by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE id = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List characters in a project, ordered by ID.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters WHERE project_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Overwrite the library-integration block. The deprecated
    /// `character_library_id` column mirrors the new remote id.
    pub async fn update_library_integration(
        pool: &PgPool,
        id: DbId,
        integration: &LibraryIntegration,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET \
                library_remote_id = $2, \
                character_library_id = $2, \
                library_sync_status = $3, \
                library_last_synced_at = $4, \
                library_last_error = $5, \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(&integration.remote_id)
            .bind(integration.sync_status.as_str())
            .bind(integration.last_synced_at)
            .bind(&integration.last_error)
            .fetch_optional(pool)
            .await
    }

    /// Delete a character by ID. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM characters WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
