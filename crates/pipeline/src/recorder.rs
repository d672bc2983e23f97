//! Append-only evidence of generation attempts.
//!
//! Every attempt, accepted or not, becomes one `character_image_metadata`
//! row. Rows are never deleted; the only update stamps `orphaned_at` when
//! the owning character goes away. "Current" state is read newest first.

use std::sync::Arc;

use nm_core::library::{ImageKind, ImageStatus, PROVIDER_CHARACTER_LIBRARY};
use nm_core::quality_gate::{CandidateScores, GateThresholds};
use nm_core::types::DbId;
use nm_db::models::image_metadata::{CharacterImageMetadata, CreateCharacterImageMetadata};
use nm_db::store::ImageMetadataStore;
use nm_library::messages::GeneratedImage;
use serde_json::{json, Value};

use crate::error::PipelineError;

/// Observed scores and context for one attempt, stored as the row's metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptMetrics<'a> {
    pub stage: &'a str,
    pub slot: &'a str,
    pub attempt: u32,
    pub scores: CandidateScores,
    pub thresholds: GateThresholds,
}

impl AttemptMetrics<'_> {
    pub fn to_json(&self) -> Value {
        json!({
            "stage": self.stage,
            "slot": self.slot,
            "attempt": self.attempt,
            "qualityScore": self.scores.quality_score,
            "consistencyScore": self.scores.consistency_score,
            "qualityThreshold": self.thresholds.quality,
            "consistencyThreshold": self.thresholds.consistency,
        })
    }
}

/// One attempt to be recorded.
#[derive(Debug, Clone)]
pub struct ImageAttempt<'a> {
    pub reference_id: DbId,
    pub kind: ImageKind,
    pub prompt: &'a str,
    /// `None` when generation itself failed.
    pub image: Option<&'a GeneratedImage>,
    pub metrics: AttemptMetrics<'a>,
}

/// Appends and reads image metadata rows.
pub struct MetadataRecorder {
    store: Arc<dyn ImageMetadataStore>,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn ImageMetadataStore>) -> Self {
        Self { store }
    }

    pub async fn record_success(
        &self,
        attempt: &ImageAttempt<'_>,
    ) -> Result<CharacterImageMetadata, PipelineError> {
        self.append(attempt, ImageStatus::Succeeded, None).await
    }

    pub async fn record_failure(
        &self,
        attempt: &ImageAttempt<'_>,
        error: &str,
    ) -> Result<CharacterImageMetadata, PipelineError> {
        self.append(attempt, ImageStatus::Failed, Some(error)).await
    }

    async fn append(
        &self,
        attempt: &ImageAttempt<'_>,
        status: ImageStatus,
        error: Option<&str>,
    ) -> Result<CharacterImageMetadata, PipelineError> {
        let input = CreateCharacterImageMetadata {
            character_reference_id: attempt.reference_id,
            media_id: None,
            kind: attempt.kind,
            provider: PROVIDER_CHARACTER_LIBRARY.to_string(),
            prompt: Some(attempt.prompt.to_string()),
            source_url: attempt.image.and_then(|i| i.url.clone()),
            external_id: attempt.image.map(|i| i.image_id.clone()),
            status,
            error: error.map(str::to_string),
            metrics: attempt.metrics.to_json(),
            created_by: None,
        };
        let row = self.store.append(&input).await?;
        tracing::debug!(
            image_metadata_id = row.id,
            reference_id = attempt.reference_id,
            kind = %attempt.kind,
            status = %status,
            "Recorded image attempt",
        );
        Ok(row)
    }

    /// All rows for a reference, newest first.
    pub async fn list_images(
        &self,
        reference_id: DbId,
    ) -> Result<Vec<CharacterImageMetadata>, PipelineError> {
        Ok(self.store.list_for_reference(reference_id).await?)
    }

    /// A single row, provided it belongs to `reference_id`.
    pub async fn get_image(
        &self,
        reference_id: DbId,
        image_id: DbId,
    ) -> Result<CharacterImageMetadata, PipelineError> {
        self.store
            .find_image(image_id)
            .await?
            .filter(|row| row.character_reference_id == reference_id)
            .ok_or(PipelineError::NotFound {
                entity: "character_image_metadata",
                id: image_id,
            })
    }

    /// The current image of `kind`: the newest accepted attempt, if any.
    pub async fn latest_succeeded(
        &self,
        reference_id: DbId,
        kind: ImageKind,
    ) -> Result<Option<CharacterImageMetadata>, PipelineError> {
        Ok(self.store.latest_succeeded(reference_id, kind).await?)
    }

    /// Stamp the reference's rows as orphaned. Returns rows stamped.
    pub async fn mark_orphaned(&self, reference_id: DbId) -> Result<u64, PipelineError> {
        Ok(self.store.mark_orphaned(reference_id).await?)
    }
}
