//! In-process store used by tests and local dry runs.
//!
//! Mirrors the Postgres semantics the pipeline relies on: ids are assigned
//! monotonically, deleting a character detaches its reference, and metadata
//! rows are listed newest first.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use nm_core::library::{ImageKind, ImageStatus, SyncStatus};
use nm_core::types::DbId;
use tokio::sync::Mutex;

use crate::models::character::{Character, CreateCharacter, LibraryIntegration};
use crate::models::character_reference::{
    CharacterReference, CreateCharacterReference, UpdateLibraryAssets,
};
use crate::models::image_metadata::{CharacterImageMetadata, CreateCharacterImageMetadata};
use crate::store::{CharacterStore, ImageMetadataStore};

#[derive(Debug, Default)]
struct State {
    next_id: DbId,
    characters: BTreeMap<DbId, Character>,
    references: BTreeMap<DbId, CharacterReference>,
    images: BTreeMap<DbId, CharacterImageMetadata>,
}

impl State {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Store that keeps all rows in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a character with an empty library integration.
    pub async fn insert_character(&self, input: CreateCharacter) -> Character {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let character = Character {
            id,
            project_id: input.project_id,
            name: input.name,
            role: input.role.unwrap_or_else(|| "supporting".to_string()),
            library_remote_id: None,
            library_sync_status: SyncStatus::Unsynced,
            library_last_synced_at: None,
            library_last_error: None,
            character_library_id: None,
            created_at: now,
            updated_at: now,
        };
        state.characters.insert(id, character.clone());
        character
    }

    /// Set only the legacy `character_library_id` column, as rows written
    /// before the integration block existed have it.
    pub async fn set_legacy_library_id(&self, character_id: DbId, remote_id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.characters.get_mut(&character_id) {
            Some(character) => {
                character.character_library_id = Some(remote_id.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn insert_reference(&self, input: CreateCharacterReference) -> CharacterReference {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let reference = CharacterReference {
            id,
            character_id: input.character_id,
            project_id: input.project_id,
            name: input.name,
            profile: input.profile,
            master_reference_url: None,
            core_set_generated: false,
            core_set_count: 0,
            generation_status: None,
            last_image_update: None,
            created_at: now,
            updated_at: now,
        };
        state.references.insert(id, reference.clone());
        reference
    }

    pub async fn find_reference(&self, id: DbId) -> Option<CharacterReference> {
        self.state.lock().await.references.get(&id).cloned()
    }
}

#[async_trait]
impl CharacterStore for InMemoryStore {
    async fn find_character(&self, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        Ok(self.state.lock().await.characters.get(&id).cloned())
    }

    async fn list_project_characters(
        &self,
        project_id: DbId,
    ) -> Result<Vec<Character>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .characters
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_reference_for_character(
        &self,
        character_id: DbId,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .references
            .values()
            .find(|r| r.character_id == Some(character_id))
            .cloned())
    }

    async fn update_library_integration(
        &self,
        character_id: DbId,
        integration: &LibraryIntegration,
    ) -> Result<Option<Character>, sqlx::Error> {
        let mut state = self.state.lock().await;
        let Some(character) = state.characters.get_mut(&character_id) else {
            return Ok(None);
        };
        character.library_remote_id = integration.remote_id.clone();
        character.character_library_id = integration.remote_id.clone();
        character.library_sync_status = integration.sync_status;
        character.library_last_synced_at = integration.last_synced_at;
        character.library_last_error = integration.last_error.clone();
        character.updated_at = Utc::now();
        Ok(Some(character.clone()))
    }

    async fn update_library_assets(
        &self,
        reference_id: DbId,
        assets: &UpdateLibraryAssets,
    ) -> Result<Option<CharacterReference>, sqlx::Error> {
        let mut state = self.state.lock().await;
        let Some(reference) = state.references.get_mut(&reference_id) else {
            return Ok(None);
        };
        if let Some(url) = &assets.master_reference_url {
            reference.master_reference_url = Some(url.clone());
        }
        reference.core_set_generated = assets.core_set_generated;
        reference.core_set_count = assets.core_set_count;
        reference.generation_status = Some(assets.generation_status.clone());
        reference.last_image_update = Some(assets.last_image_update);
        reference.updated_at = Utc::now();
        Ok(Some(reference.clone()))
    }

    async fn delete_character(&self, id: DbId) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().await;
        if state.characters.remove(&id).is_none() {
            return Ok(false);
        }
        for reference in state.references.values_mut() {
            if reference.character_id == Some(id) {
                reference.character_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ImageMetadataStore for InMemoryStore {
    async fn append(
        &self,
        input: &CreateCharacterImageMetadata,
    ) -> Result<CharacterImageMetadata, sqlx::Error> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let row = CharacterImageMetadata {
            id,
            character_reference_id: input.character_reference_id,
            media_id: input.media_id,
            kind: input.kind,
            provider: input.provider.clone(),
            prompt: input.prompt.clone(),
            source_url: input.source_url.clone(),
            external_id: input.external_id.clone(),
            status: input.status,
            error: input.error.clone(),
            metrics: input.metrics.clone(),
            created_by: input.created_by,
            created_at: Utc::now(),
            orphaned_at: None,
        };
        state.images.insert(id, row.clone());
        Ok(row)
    }

    async fn list_for_reference(
        &self,
        reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .images
            .values()
            .filter(|r| r.character_reference_id == reference_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn find_image(&self, id: DbId) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        Ok(self.state.lock().await.images.get(&id).cloned())
    }

    async fn latest_succeeded(
        &self,
        reference_id: DbId,
        kind: ImageKind,
    ) -> Result<Option<CharacterImageMetadata>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .images
            .values()
            .filter(|r| {
                r.character_reference_id == reference_id
                    && r.kind == kind
                    && r.status == ImageStatus::Succeeded
            })
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn mark_orphaned(&self, reference_id: DbId) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut stamped = 0;
        for row in state.images.values_mut() {
            if row.character_reference_id == reference_id && row.orphaned_at.is_none() {
                row.orphaned_at = Some(now);
                stamped += 1;
            }
        }
        Ok(stamped)
    }
}

#[cfg(test)]
mod tests {
    use nm_core::prompt::CharacterProfile;

    use super::*;

    async fn seeded() -> (InMemoryStore, Character, CharacterReference) {
        let store = InMemoryStore::new();
        let character = store
            .insert_character(CreateCharacter {
                project_id: 1,
                name: "Mara".into(),
                role: None,
            })
            .await;
        let reference = store
            .insert_reference(CreateCharacterReference {
                character_id: Some(character.id),
                project_id: 1,
                name: "Mara".into(),
                profile: CharacterProfile::default(),
            })
            .await;
        (store, character, reference)
    }

    fn attempt(reference_id: DbId, status: ImageStatus) -> CreateCharacterImageMetadata {
        CreateCharacterImageMetadata {
            character_reference_id: reference_id,
            media_id: None,
            kind: ImageKind::Reference,
            provider: "character-library".into(),
            prompt: None,
            source_url: None,
            external_id: None,
            status,
            error: None,
            metrics: serde_json::json!({}),
            created_by: None,
        }
    }

    #[tokio::test]
    async fn images_listed_newest_first() {
        let (store, _, reference) = seeded().await;
        let first = store
            .append(&attempt(reference.id, ImageStatus::Failed))
            .await
            .unwrap();
        let second = store
            .append(&attempt(reference.id, ImageStatus::Succeeded))
            .await
            .unwrap();

        let rows = store.list_for_reference(reference.id).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn integration_update_mirrors_legacy_id() {
        let (store, character, _) = seeded().await;
        let integration = LibraryIntegration {
            remote_id: Some("rc-1".into()),
            sync_status: SyncStatus::Synced,
            last_synced_at: Some(Utc::now()),
            last_error: None,
        };
        let updated = store
            .update_library_integration(character.id, &integration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.character_library_id.as_deref(), Some("rc-1"));
        assert_eq!(updated.library_integration(), integration);
    }

    #[tokio::test]
    async fn delete_detaches_reference_and_keeps_images() {
        let (store, character, reference) = seeded().await;
        store
            .append(&attempt(reference.id, ImageStatus::Succeeded))
            .await
            .unwrap();

        assert!(store.delete_character(character.id).await.unwrap());
        assert!(!store.delete_character(character.id).await.unwrap());

        let detached = store.find_reference(reference.id).await.unwrap();
        assert_eq!(detached.character_id, None);
        assert_eq!(store.mark_orphaned(reference.id).await.unwrap(), 1);
        assert_eq!(store.mark_orphaned(reference.id).await.unwrap(), 0);
        assert_eq!(store.list_for_reference(reference.id).await.unwrap().len(), 1);
    }
}
