//! Repository for the `character_references` table.

use nm_core::types::DbId;
use sqlx::PgPool;

use crate::models::character_reference::{CharacterReference, UpdateLibraryAssets};

const COLUMNS: &str = "id, character_id, project_id, name, profile, master_reference_url, \
     core_set_generated, core_set_count, generation_status, last_image_update, \
     created_at, updated_at";

/// Lookups and asset updates for character references.
pub struct CharacterReferenceRepo;

impl CharacterReferenceRepo {
    /// Find the reference attached to a character, if any.
    pub async fn find_by_character(
        pool: &PgPool,
        character_id: DbId,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM character_references WHERE character_id = $1 LIMIT 1"
        );
        sqlx::query_as::<_, CharacterReference>(&query)
            .bind(character_id)
            .fetch_optional(pool)
            .await
    }

    /// Write the asset fields produced by a generation run.
    pub async fn update_library_assets(
        pool: &PgPool,
        id: DbId,
        input: &UpdateLibraryAssets,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        let query = format!(
            "UPDATE character_references SET \
                master_reference_url = COALESCE($2, master_reference_url), \
                core_set_generated = $3, \
                core_set_count = $4, \
                generation_status = $5, \
                last_image_update = $6, \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterReference>(&query)
            .bind(id)
            .bind(&input.master_reference_url)
            .bind(input.core_set_generated)
            .bind(input.core_set_count)
            .bind(&input.generation_status)
            .bind(input.last_image_update)
            .fetch_optional(pool)
            .await
    }
}
