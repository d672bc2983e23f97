//! Storage seams used by the orchestration layer.
//!
//! The pipeline only needs a handful of reads and writes, so they are
//! expressed as two narrow traits. [`PgStore`] forwards to the repositories;
//! [`crate::memory::InMemoryStore`] keeps everything in process.

use async_trait::async_trait;
use nm_core::library::ImageKind;
use nm_core::types::DbId;
use sqlx::PgPool;

use crate::models::character::{Character, LibraryIntegration};
use crate::models::character_reference::{CharacterReference, UpdateLibraryAssets};
use crate::models::image_metadata::{CharacterImageMetadata, CreateCharacterImageMetadata};
use crate::repositories::{CharacterImageMetadataRepo, CharacterReferenceRepo, CharacterRepo};

/* --------------------------------------------------------------------------
Traits
-------------------------------------------------------------------------- */

/// Character and character-reference access.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn find_character(&self, id: DbId) -> Result<Option<Character>, sqlx::Error>;

    /// Characters of a project in a stable (id) order.
    async fn list_project_characters(
        &self,
        project_id: DbId,
    ) -> Result<Vec<Character>, sqlx::Error>;

    async fn find_reference_for_character(
        &self,
        character_id: DbId,
    ) -> Result<Option<CharacterReference>, sqlx::Error>;

    /// Overwrite the library-integration block. `None` if the character is gone.
    async fn update_library_integration(
        &self,
        character_id: DbId,
        integration: &LibraryIntegration,
    ) -> Result<Option<Character>, sqlx::Error>;

    async fn update_library_assets(
        &self,
        reference_id: DbId,
        assets: &UpdateLibraryAssets,
    ) -> Result<Option<CharacterReference>, sqlx::Error>;

    /// Remove the character row. The reference survives with its
    /// `character_id` cleared.
    async fn delete_character(&self, id: DbId) -> Result<bool, sqlx::Error>;
}

/// Append-only image metadata access.
#[async_trait]
pub trait ImageMetadataStore: Send + Sync {
    async fn append(
        &self,
        input: &CreateCharacterImageMetadata,
    ) -> Result<CharacterImageMetadata, sqlx::Error>;

    /// Rows for a reference, newest first.
    async fn list_for_reference(
        &self,
        reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, sqlx::Error>;

    async fn find_image(&self, id: DbId) -> Result<Option<CharacterImageMetadata>, sqlx::Error>;

    /// Newest succeeded row of `kind` for a reference.
    async fn latest_succeeded(
        &self,
        reference_id: DbId,
        kind: ImageKind,
    ) -> Result<Option<CharacterImageMetadata>, sqlx::Error>;

    /// Stamp `orphaned_at` on the reference's rows. Returns rows stamped.
    async fn mark_orphaned(&self, reference_id: DbId) -> Result<u64, sqlx::Error>;
}

/* --------------------------------------------------------------------------
Postgres adapter
-------------------------------------------------------------------------- */

/// Store backed by the Postgres repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CharacterStore for PgStore {
    async fn find_character(&self, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        CharacterRepo::find_by_id(&self.pool, id).await
    }

    async fn list_project_characters(
        &self,
        project_id: DbId,
    ) -> Result<Vec<Character>, sqlx::Error> {
        CharacterRepo::list_by_project(&self.pool, project_id).await
    }

    async fn find_reference_for_character(
        &self,
        character_id: DbId,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        CharacterReferenceRepo::find_by_character(&self.pool, character_id).await
    }

    async fn update_library_integration(
        &self,
        character_id: DbId,
        integration: &LibraryIntegration,
    ) -> Result<Option<Character>, sqlx::Error> {
        CharacterRepo::update_library_integration(&self.pool, character_id, integration).await
    }

    async fn update_library_assets(
        &self,
        reference_id: DbId,
        assets: &UpdateLibraryAssets,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        CharacterReferenceRepo::update_library_assets(&self.pool, reference_id, assets).await
    }

    async fn delete_character(&self, id: DbId) -> Result<bool, sqlx::Error> {
        CharacterRepo::delete(&self.pool, id).await
    }
}

#[async_trait]
impl ImageMetadataStore for PgStore {
    async fn append(
        &self,
        input: &CreateCharacterImageMetadata,
    ) -> Result<CharacterImageMetadata, sqlx::Error> {
        CharacterImageMetadataRepo::create(&self.pool, input).await
    }

    async fn list_for_reference(
        &self,
        reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, sqlx::Error> {
        CharacterImageMetadataRepo::list_by_reference(&self.pool, reference_id).await
    }

    async fn find_image(&self, id: DbId) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        CharacterImageMetadataRepo::find_by_id(&self.pool, id).await
    }

    async fn latest_succeeded(
        &self,
        reference_id: DbId,
        kind: ImageKind,
    ) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        CharacterImageMetadataRepo::find_latest_succeeded(&self.pool, reference_id, kind).await
    }

    async fn mark_orphaned(&self, reference_id: DbId) -> Result<u64, sqlx::Error> {
        CharacterImageMetadataRepo::mark_orphaned_by_reference(&self.pool, reference_id).await
    }
}
