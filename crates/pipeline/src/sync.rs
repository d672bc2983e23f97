//! Reconciles local characters with their remote counterparts.
//!
//! Sync is delete-and-recreate: any existing remote entity is deleted
//! (best-effort) and a fresh one is created from current local state. The
//! new remote id replaces the old one; remote ids are never reused.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use nm_core::library::SyncStatus;
use nm_core::types::{DbId, Timestamp};
use nm_db::models::character::{Character, LibraryIntegration};
use nm_db::models::character_reference::CharacterReference;
use nm_db::store::CharacterStore;
use nm_library::messages::{
    character_slug, rich_text, NovelMovieIntegration, RemoteCharacterPayload,
};
use nm_library::CharacterLibrary;
use serde::Serialize;

use crate::error::PipelineError;
use crate::lock::CharacterLocks;
use crate::recorder::MetadataRecorder;
use crate::retry::with_transport_retry;
use crate::settings::PipelineSettings;

/* --------------------------------------------------------------------------
Results
-------------------------------------------------------------------------- */

/// Outcome of syncing one character.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub character_id: DbId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn synced(character_id: DbId, remote_id: String) -> Self {
        Self {
            character_id,
            success: true,
            remote_id: Some(remote_id),
            error: None,
        }
    }

    fn failed(character_id: DbId, error: impl Into<String>) -> Self {
        Self {
            character_id,
            success: false,
            remote_id: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of syncing every character of a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSyncResult {
    pub project_id: DbId,
    /// `true` only when every character synced.
    pub success: bool,
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    /// One entry per character, in project order.
    pub results: Vec<SyncResult>,
}

/// Outcome of deleting a character.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub character_id: DbId,
    /// `false` when there was no remote entity or its deletion failed.
    pub remote_deleted: bool,
    pub orphaned_images: u64,
}

/* --------------------------------------------------------------------------
Payload
-------------------------------------------------------------------------- */

/// Build the remote-character payload from the character and its optional
/// reference. Pure: the same inputs always give the same payload.
pub fn build_character_payload(
    character: &Character,
    reference: Option<&CharacterReference>,
    now: Timestamp,
) -> RemoteCharacterPayload {
    let profile = reference.map(|r| r.profile.clone()).unwrap_or_default();
    let text = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();

    RemoteCharacterPayload {
        name: character.name.clone(),
        character_id: character_slug(character.project_id, character.id, &character.name, now),
        status: "in_development",
        biography: rich_text(&text(&profile.biography)),
        personality: rich_text(&text(&profile.personality)),
        physical_description: rich_text(&text(&profile.description)),
        clothing: rich_text(&text(&profile.wardrobe)),
        age: profile.age,
        height: text(&profile.height),
        eye_color: text(&profile.eye_color),
        hair_color: text(&profile.hair),
        novel_movie_integration: NovelMovieIntegration {
            project_id: character.project_id.to_string(),
            sync_status: SyncStatus::Synced.as_str(),
            last_sync_at: now,
        },
    }
}

/* --------------------------------------------------------------------------
Orchestrator
-------------------------------------------------------------------------- */

pub struct SyncOrchestrator {
    characters: Arc<dyn CharacterStore>,
    library: Arc<dyn CharacterLibrary>,
    recorder: Arc<MetadataRecorder>,
    locks: Arc<CharacterLocks>,
    settings: PipelineSettings,
}

impl SyncOrchestrator {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        library: Arc<dyn CharacterLibrary>,
        recorder: Arc<MetadataRecorder>,
        locks: Arc<CharacterLocks>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            characters,
            library,
            recorder,
            locks,
            settings,
        }
    }

    pub fn locks(&self) -> &CharacterLocks {
        &self.locks
    }

    /// Sync one character. Never fails: problems are reported in the result
    /// and, where the character exists, in its library integration.
    pub async fn sync_character(&self, character_id: DbId) -> SyncResult {
        let _guard = self.locks.acquire(character_id).await;
        self.sync_locked(character_id).await
    }

    /// Sync without taking the character lock. The caller must hold it.
    pub(crate) async fn sync_locked(&self, character_id: DbId) -> SyncResult {
        match self.replace_remote(character_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(character_id, error = %e, "Character sync failed");
                SyncResult::failed(character_id, e.to_string())
            }
        }
    }

    async fn replace_remote(&self, character_id: DbId) -> Result<SyncResult, PipelineError> {
        let character = self
            .characters
            .find_character(character_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "character",
                id: character_id,
            })?;
        let reference = self
            .characters
            .find_reference_for_character(character_id)
            .await?;

        let prior = character.linked_remote_id().map(str::to_string);
        let mut prior_gone = true;
        if let Some(remote_id) = prior.as_deref() {
            match self.delete_remote(remote_id).await {
                Ok(()) => {
                    tracing::info!(character_id, remote_id, "Deleted previous remote character")
                }
                Err(e) => {
                    tracing::warn!(
                        character_id,
                        remote_id,
                        error = %e,
                        "Could not delete previous remote character, continuing",
                    );
                    prior_gone = false;
                }
            }
        }

        let now = Utc::now();
        let payload = build_character_payload(&character, reference.as_ref(), now);
        let created = with_transport_retry(
            "create_character",
            self.settings.transport_attempts,
            &self.settings.backoff,
            || self.library.create_character(&payload),
        )
        .await;

        match created {
            Ok(created) => {
                let integration = LibraryIntegration {
                    remote_id: Some(created.remote_id.clone()),
                    sync_status: SyncStatus::Synced,
                    last_synced_at: Some(now),
                    last_error: None,
                };
                self.persist(character_id, &integration).await?;
                tracing::info!(character_id, remote_id = %created.remote_id, "Character synced");
                Ok(SyncResult::synced(character_id, created.remote_id))
            }
            Err(e) => {
                let message = e.to_string();
                // Keep the old id only while its entity may still exist, so
                // the next sync retries the delete.
                let previous = character.library_integration();
                let integration = LibraryIntegration {
                    remote_id: if prior_gone { None } else { prior },
                    sync_status: SyncStatus::Error,
                    last_error: Some(message.clone()),
                    ..previous
                };
                self.persist(character_id, &integration).await?;
                tracing::warn!(character_id, error = %message, "Remote character create failed");
                Ok(SyncResult::failed(character_id, message))
            }
        }
    }

    async fn delete_remote(&self, remote_id: &str) -> Result<(), PipelineError> {
        with_transport_retry(
            "delete_character",
            self.settings.transport_attempts,
            &self.settings.backoff,
            || self.library.delete_character(remote_id),
        )
        .await
        .map_err(PipelineError::from)
    }

    async fn persist(
        &self,
        character_id: DbId,
        integration: &LibraryIntegration,
    ) -> Result<(), PipelineError> {
        self.characters
            .update_library_integration(character_id, integration)
            .await?
            .map(|_| ())
            .ok_or(PipelineError::NotFound {
                entity: "character",
                id: character_id,
            })
    }

    /// Sync every character of a project with bounded concurrency. One
    /// failure never stops the others.
    pub async fn sync_project(&self, project_id: DbId) -> Result<ProjectSyncResult, PipelineError> {
        let characters = self.characters.list_project_characters(project_id).await?;
        tracing::info!(
            project_id,
            characters = characters.len(),
            concurrency = self.settings.sync_concurrency,
            "Syncing project characters",
        );

        let ids: Vec<DbId> = characters.iter().map(|c| c.id).collect();
        let results: Vec<SyncResult> = stream::iter(ids)
            .map(|id| self.sync_character(id))
            .buffered(self.settings.sync_concurrency.max(1))
            .collect()
            .await;

        let synced = results.iter().filter(|r| r.success).count();
        let failed = results.len() - synced;
        if failed > 0 {
            tracing::warn!(project_id, synced, failed, "Project sync finished with failures");
        }
        Ok(ProjectSyncResult {
            project_id,
            success: failed == 0,
            total: results.len(),
            synced,
            failed,
            results,
        })
    }

    /// Delete a character: best-effort remote delete, orphan its image
    /// metadata, then remove the local row.
    pub async fn delete_character(
        &self,
        character_id: DbId,
    ) -> Result<DeleteOutcome, PipelineError> {
        let _guard = self.locks.acquire(character_id).await;

        let character = self
            .characters
            .find_character(character_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "character",
                id: character_id,
            })?;
        let reference = self
            .characters
            .find_reference_for_character(character_id)
            .await?;

        let remote_deleted = match character.linked_remote_id() {
            Some(remote_id) => match self.delete_remote(remote_id).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        character_id,
                        remote_id,
                        error = %e,
                        "Remote delete failed, deleting locally anyway",
                    );
                    false
                }
            },
            None => false,
        };

        let orphaned_images = match &reference {
            Some(reference) => self.recorder.mark_orphaned(reference.id).await?,
            None => 0,
        };
        self.characters.delete_character(character_id).await?;

        tracing::info!(character_id, remote_deleted, orphaned_images, "Character deleted");
        Ok(DeleteOutcome {
            character_id,
            remote_deleted,
            orphaned_images,
        })
    }
}
