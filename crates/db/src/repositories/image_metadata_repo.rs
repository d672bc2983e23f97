//! Repository for the `character_image_metadata` table.
//!
//! Append-only: there is no general update or delete. Rows outlive their
//! character and are stamped with `orphaned_at` instead.

use nm_core::library::ImageKind;
use nm_core::types::DbId;
use sqlx::PgPool;

use crate::models::image_metadata::{CharacterImageMetadata, CreateCharacterImageMetadata};

const COLUMNS: &str = "id, character_reference_id, media_id, kind, provider, prompt, \
     source_url, external_id, status, error, metrics, created_by, created_at, orphaned_at";

/// Provides append and read operations for image metadata.
pub struct CharacterImageMetadataRepo;

impl CharacterImageMetadataRepo {
    /// Append a metadata row, returning it.
    pub async fn create(
        pool: &PgPool,
        input: &CreateCharacterImageMetadata,
    ) -> Result<CharacterImageMetadata, sqlx::Error> {
        let query = format!(
            "INSERT INTO character_image_metadata \
                (character_reference_id, media_id, kind, provider, prompt, source_url, \
                 external_id, status, error, metrics, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterImageMetadata>(&query)
            .bind(input.character_reference_id)
            .bind(input.media_id)
            .bind(input.kind.as_str())
            .bind(&input.provider)
            .bind(&input.prompt)
            .bind(&input.source_url)
            .bind(&input.external_id)
            .bind(input.status.as_str())
            .bind(&input.error)
            .bind(&input.metrics)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a metadata row by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM character_image_metadata WHERE id = $1");
        sqlx::query_as::<_, CharacterImageMetadata>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List rows for a reference, newest first.
    pub async fn list_by_reference(
        pool: &PgPool,
        character_reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM character_image_metadata \
             WHERE character_reference_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, CharacterImageMetadata>(&query)
            .bind(character_reference_id)
            .fetch_all(pool)
            .await
    }

    /// The newest succeeded row of a kind for a reference.
    pub async fn find_latest_succeeded(
        pool: &PgPool,
        character_reference_id: DbId,
        kind: ImageKind,
    ) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM character_image_metadata \
             WHERE character_reference_id = $1 AND kind = $2 AND status = 'succeeded' \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, CharacterImageMetadata>(&query)
            .bind(character_reference_id)
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Stamp `orphaned_at` on every not-yet-orphaned row of a reference.
    /// Returns the number of rows stamped.
    pub async fn mark_orphaned_by_reference(
        pool: &PgPool,
        character_reference_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE character_image_metadata SET orphaned_at = now() \
             WHERE character_reference_id = $1 AND orphaned_at IS NULL",
        )
        .bind(character_reference_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
