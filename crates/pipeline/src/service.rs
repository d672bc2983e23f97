//! Facade over the orchestrators, the recorder and the health monitor.

use std::sync::Arc;

use nm_core::types::DbId;
use nm_db::models::image_metadata::CharacterImageMetadata;
use nm_db::store::{CharacterStore, ImageMetadataStore};
use nm_library::messages::{ProjectConsistencyRequest, SceneContext};
use nm_library::{CharacterLibrary, HealthMonitor, HealthResult, LibraryApi, LibraryConfig};
use serde_json::Value;

use crate::error::PipelineError;
use crate::generation::{GenerationOrchestrator, GenerationResult, StageOutcome};
use crate::lock::CharacterLocks;
use crate::recorder::MetadataRecorder;
use crate::retry::with_transport_retry;
use crate::settings::PipelineSettings;
use crate::sync::{DeleteOutcome, ProjectSyncResult, SyncOrchestrator, SyncResult};

/// Everything the host application calls for character-library work.
pub struct CharacterLibraryService {
    sync: Arc<SyncOrchestrator>,
    generation: GenerationOrchestrator,
    recorder: Arc<MetadataRecorder>,
    library: Arc<dyn CharacterLibrary>,
    health: HealthMonitor,
    settings: PipelineSettings,
}

impl CharacterLibraryService {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        images: Arc<dyn ImageMetadataStore>,
        library: Arc<dyn CharacterLibrary>,
        health: HealthMonitor,
        settings: PipelineSettings,
    ) -> Self {
        let recorder = Arc::new(MetadataRecorder::new(images));
        let locks = Arc::new(CharacterLocks::new());
        let sync = Arc::new(SyncOrchestrator::new(
            Arc::clone(&characters),
            Arc::clone(&library),
            Arc::clone(&recorder),
            locks,
            settings.clone(),
        ));
        let generation = GenerationOrchestrator::new(
            characters,
            Arc::clone(&library),
            Arc::clone(&recorder),
            Arc::clone(&sync),
            settings.clone(),
        );
        Self {
            sync,
            generation,
            recorder,
            library,
            health,
            settings,
        }
    }

    /// Wire the HTTP client and health monitor from `config`.
    pub fn from_config(
        config: &LibraryConfig,
        characters: Arc<dyn CharacterStore>,
        images: Arc<dyn ImageMetadataStore>,
    ) -> Self {
        Self::new(
            characters,
            images,
            Arc::new(LibraryApi::new(config)),
            HealthMonitor::new(config),
            PipelineSettings::from(config),
        )
    }

    pub async fn sync_character(&self, character_id: DbId) -> SyncResult {
        self.sync.sync_character(character_id).await
    }

    pub async fn sync_project(&self, project_id: DbId) -> Result<ProjectSyncResult, PipelineError> {
        self.sync.sync_project(project_id).await
    }

    pub async fn delete_character(
        &self,
        character_id: DbId,
    ) -> Result<DeleteOutcome, PipelineError> {
        self.sync.delete_character(character_id).await
    }

    pub async fn regenerate(&self, character_id: DbId) -> Result<GenerationResult, PipelineError> {
        self.generation.regenerate(character_id).await
    }

    pub async fn generate_scene_image(
        &self,
        character_id: DbId,
        context: &SceneContext,
    ) -> Result<StageOutcome, PipelineError> {
        self.generation
            .generate_scene_image(character_id, context)
            .await
    }

    pub async fn generate_initial_image(
        &self,
        character_id: DbId,
        prompt_override: Option<&str>,
    ) -> Result<StageOutcome, PipelineError> {
        self.generation
            .generate_initial_image(character_id, prompt_override)
            .await
    }

    pub async fn generate_360_set(
        &self,
        character_id: DbId,
    ) -> Result<StageOutcome, PipelineError> {
        self.generation.generate_360_set(character_id).await
    }

    /// Ask the service for a project-wide consistency report, using the
    /// configured gate thresholds. The report is returned untouched.
    pub async fn validate_project_consistency(
        &self,
        project_id: DbId,
    ) -> Result<Value, PipelineError> {
        let thresholds = self.settings.thresholds;
        let request =
            ProjectConsistencyRequest::full(project_id, thresholds.quality, thresholds.consistency);
        let report = with_transport_retry(
            "validate_project_consistency",
            self.settings.transport_attempts,
            &self.settings.backoff,
            || self.library.validate_project_consistency(&request),
        )
        .await?;
        tracing::info!(project_id, "Project consistency validated");
        Ok(report)
    }

    pub async fn initial_image_prompt(&self, character_id: DbId) -> Result<String, PipelineError> {
        self.generation.initial_image_prompt(character_id).await
    }

    pub async fn check_health(&self) -> HealthResult {
        self.health.check().await
    }

    pub async fn list_images(
        &self,
        reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, PipelineError> {
        self.recorder.list_images(reference_id).await
    }

    pub async fn get_image(
        &self,
        reference_id: DbId,
        image_id: DbId,
    ) -> Result<CharacterImageMetadata, PipelineError> {
        self.recorder.get_image(reference_id, image_id).await
    }
}
