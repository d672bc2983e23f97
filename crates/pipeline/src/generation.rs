//! Gated multi-stage image generation.
//!
//! A run generates, in order: the reference image, one portfolio image per
//! configured shot, and the core set. Every candidate is checked with
//! `validate_consistency` and must pass both gates; a rejected slot is
//! regenerated up to the slot budget. Each attempt leaves one metadata row
//! per image. Only the reference slot is fatal: without a reference image
//! later stages have nothing to stay consistent with.
//!
//! The reference image, a 360 turnaround set and scene images can also be
//! generated on their own for a character that is already linked.

use std::sync::Arc;

use chrono::Utc;
use nm_core::library::{ImageKind, GENERATION_STATUS_FAILED, GENERATION_STATUS_IMAGES_CREATED};
use nm_core::prompt::{build_portfolio_prompt, build_reference_prompt, CharacterProfile};
use nm_core::quality_gate::{
    evaluate_candidate, gate_failure_message, CandidateScores, GateThresholds, GateVerdict,
};
use nm_core::retry::RetryBudget;
use nm_core::types::DbId;
use nm_db::models::character::Character;
use nm_db::models::character_reference::{CharacterReference, UpdateLibraryAssets};
use nm_db::store::CharacterStore;
use nm_library::messages::{
    ConsistencyReport, GeneratedImage, SceneContext, SceneImageRequest, SmartImageRequest,
    TurnaroundRequest,
};
use nm_library::{CharacterLibrary, LibraryApiError};
use serde::Serialize;

use crate::error::PipelineError;
use crate::recorder::{AttemptMetrics, ImageAttempt, MetadataRecorder};
use crate::retry::with_transport_retry;
use crate::settings::PipelineSettings;
use crate::sync::SyncOrchestrator;

pub const STAGE_INITIAL: &str = "initial";
pub const STAGE_PORTFOLIO: &str = "portfolio";
pub const STAGE_CORE_SET: &str = "core_set";
pub const STAGE_SCENE: &str = "scene";
pub const STAGE_TURNAROUND: &str = "turnaround";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one slot (reference, a portfolio shot, the core set, a scene).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub stage: String,
    pub slot: String,
    pub kind: ImageKind,
    pub success: bool,
    /// Attempts consumed from the slot budget.
    pub attempts: u32,
    /// Accepted images; empty on failure.
    pub images: Vec<GeneratedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a full regeneration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub character_id: DbId,
    /// Whether the reference image was produced. Later stages may still
    /// have failed; see `stages`.
    pub success: bool,
    pub remote_id: Option<String>,
    pub reference_image: Option<GeneratedImage>,
    pub stages: Vec<StageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Slot plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum SlotRequest {
    Initial { prompt: String },
    Smart(SmartImageRequest),
    CoreSet,
    Turnaround(TurnaroundRequest),
    Scene(SceneImageRequest),
}

#[derive(Debug, Clone)]
struct SlotPlan {
    stage: &'static str,
    slot: String,
    kind: ImageKind,
    /// Recorded on every metadata row of the slot.
    prompt: String,
    request: SlotRequest,
}

impl SlotPlan {
    fn reference(name: &str, profile: &CharacterProfile) -> Self {
        Self::reference_with_prompt(build_reference_prompt(name, profile))
    }

    fn reference_with_prompt(prompt: String) -> Self {
        Self {
            stage: STAGE_INITIAL,
            slot: "reference".to_string(),
            kind: ImageKind::Reference,
            request: SlotRequest::Initial {
                prompt: prompt.clone(),
            },
            prompt,
        }
    }

    fn portfolio(
        name: &str,
        profile: &CharacterProfile,
        shot: &str,
        settings: &PipelineSettings,
    ) -> Self {
        let prompt = build_portfolio_prompt(name, profile, shot);
        Self {
            stage: STAGE_PORTFOLIO,
            slot: format!("portfolio:{shot}"),
            kind: ImageKind::PortfolioItem,
            request: SlotRequest::Smart(SmartImageRequest {
                prompt: prompt.clone(),
                max_retries: None,
                quality_threshold: Some(settings.thresholds.quality),
                consistency_threshold: Some(settings.thresholds.consistency),
                style: Some(settings.style.clone()),
                tags: Some(shot.to_string()),
            }),
            prompt,
        }
    }

    fn core_set(name: &str) -> Self {
        Self {
            stage: STAGE_CORE_SET,
            slot: "core_set".to_string(),
            kind: ImageKind::PortfolioItem,
            prompt: format!("core reference set of {}", name.trim()),
            request: SlotRequest::CoreSet,
        }
    }

    fn turnaround(name: &str, settings: &PipelineSettings) -> Self {
        Self {
            stage: STAGE_TURNAROUND,
            slot: "turnaround".to_string(),
            kind: ImageKind::PortfolioItem,
            prompt: format!("360 turnaround of {}", name.trim()),
            request: SlotRequest::Turnaround(TurnaroundRequest {
                style: Some(settings.turnaround_style.clone()),
                quality_threshold: Some(settings.thresholds.quality),
                image_count: Some(settings.turnaround_images),
            }),
        }
    }

    fn attempt<'a>(
        &'a self,
        reference_id: DbId,
        attempt: u32,
        thresholds: GateThresholds,
        image: Option<&'a GeneratedImage>,
        scores: CandidateScores,
    ) -> ImageAttempt<'a> {
        ImageAttempt {
            reference_id,
            kind: self.kind,
            prompt: &self.prompt,
            image,
            metrics: AttemptMetrics {
                stage: self.stage,
                slot: &self.slot,
                attempt,
                scores,
                thresholds,
            },
        }
    }

    fn scene(context: &SceneContext) -> Self {
        Self {
            stage: STAGE_SCENE,
            slot: "scene".to_string(),
            kind: ImageKind::Scene,
            prompt: context.description.trim().to_string(),
            request: SlotRequest::Scene(SceneImageRequest::from(context)),
        }
    }
}

/// Why one attempt of a slot was not accepted.
#[derive(Debug, Clone)]
enum AttemptFailure {
    Gate(GateVerdict),
    Error(String),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct GenerationOrchestrator {
    characters: Arc<dyn CharacterStore>,
    library: Arc<dyn CharacterLibrary>,
    recorder: Arc<MetadataRecorder>,
    sync: Arc<SyncOrchestrator>,
    settings: PipelineSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        library: Arc<dyn CharacterLibrary>,
        recorder: Arc<MetadataRecorder>,
        sync: Arc<SyncOrchestrator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            characters,
            library,
            recorder,
            sync,
            settings,
        }
    }

    /// Run the full pipeline for one character.
    ///
    /// Holds the character lock throughout, so a concurrent sync cannot
    /// replace the remote entity mid-run.
    pub async fn regenerate(&self, character_id: DbId) -> Result<GenerationResult, PipelineError> {
        let _guard = self.sync.locks().acquire(character_id).await;
        let (character, reference) = self.load(character_id).await?;

        let remote_id = match character.linked_remote_id().map(str::to_string) {
            Some(remote_id) => remote_id,
            None => {
                tracing::info!(character_id, "Character not in library yet, syncing first");
                let sync = self.sync.sync_locked(character_id).await;
                match sync.remote_id {
                    Some(remote_id) if sync.success => remote_id,
                    _ => {
                        let reason = sync.error.unwrap_or_else(|| "unknown error".to_string());
                        return Ok(GenerationResult {
                            character_id,
                            success: false,
                            remote_id: None,
                            reference_image: None,
                            stages: Vec::new(),
                            error: Some(format!("sync failed: {reason}")),
                        });
                    }
                }
            }
        };

        tracing::info!(character_id, remote_id = %remote_id, "Starting character image generation");
        let mut stages = Vec::new();

        let reference_stage = self
            .run_slot(
                &remote_id,
                reference.id,
                SlotPlan::reference(&character.name, &reference.profile),
            )
            .await?;
        let reference_image = reference_stage.images.first().cloned();
        let reference_error = reference_stage.error.clone();
        stages.push(reference_stage);

        let Some(reference_image) = reference_image else {
            self.update_assets(reference.id, &stages, None).await?;
            let error = reference_error.unwrap_or_else(|| "reference image failed".to_string());
            tracing::warn!(character_id, error = %error, "Reference image failed, halting");
            return Ok(GenerationResult {
                character_id,
                success: false,
                remote_id: Some(remote_id),
                reference_image: None,
                stages,
                error: Some(error),
            });
        };

        for shot in &self.settings.portfolio_shots {
            let plan =
                SlotPlan::portfolio(&character.name, &reference.profile, shot, &self.settings);
            stages.push(self.run_slot(&remote_id, reference.id, plan).await?);
        }
        stages.push(
            self.run_slot(&remote_id, reference.id, SlotPlan::core_set(&character.name))
                .await?,
        );

        self.update_assets(reference.id, &stages, Some(&reference_image))
            .await?;

        let failed = stages.iter().filter(|s| !s.success).count();
        tracing::info!(
            character_id,
            stages = stages.len(),
            failed,
            "Character image generation finished",
        );
        Ok(GenerationResult {
            character_id,
            success: true,
            remote_id: Some(remote_id),
            reference_image: Some(reference_image),
            stages,
            error: None,
        })
    }

    /// Generate one gated scene image. The character must already be synced.
    pub async fn generate_scene_image(
        &self,
        character_id: DbId,
        context: &SceneContext,
    ) -> Result<StageOutcome, PipelineError> {
        if context.description.trim().is_empty() {
            return Err(PipelineError::Validation(
                "scene description must not be empty".to_string(),
            ));
        }

        let _guard = self.sync.locks().acquire(character_id).await;
        let (character, reference) = self.load(character_id).await?;
        let remote_id = require_link(&character)?;

        self.run_slot(&remote_id, reference.id, SlotPlan::scene(context))
            .await
    }

    /// Generate the reference image on its own. A non-blank
    /// `prompt_override` replaces the prompt built from the profile.
    pub async fn generate_initial_image(
        &self,
        character_id: DbId,
        prompt_override: Option<&str>,
    ) -> Result<StageOutcome, PipelineError> {
        let _guard = self.sync.locks().acquire(character_id).await;
        let (character, reference) = self.load(character_id).await?;
        let remote_id = require_link(&character)?;

        let plan = match prompt_override.map(str::trim).filter(|p| !p.is_empty()) {
            Some(prompt) => SlotPlan::reference_with_prompt(prompt.to_string()),
            None => SlotPlan::reference(&character.name, &reference.profile),
        };
        let outcome = self.run_slot(&remote_id, reference.id, plan).await?;

        let assets = UpdateLibraryAssets {
            master_reference_url: outcome.images.first().and_then(|i| i.url.clone()),
            core_set_generated: reference.core_set_generated,
            core_set_count: reference.core_set_count,
            generation_status: if outcome.success {
                GENERATION_STATUS_IMAGES_CREATED
            } else {
                GENERATION_STATUS_FAILED
            }
            .to_string(),
            last_image_update: Utc::now(),
        };
        self.write_assets(reference.id, &assets).await?;
        Ok(outcome)
    }

    /// Generate a gated 360 turnaround set. Every view must pass the gates;
    /// an accepted set counts as the character's core set.
    pub async fn generate_360_set(
        &self,
        character_id: DbId,
    ) -> Result<StageOutcome, PipelineError> {
        let _guard = self.sync.locks().acquire(character_id).await;
        let (character, reference) = self.load(character_id).await?;
        let remote_id = require_link(&character)?;

        let plan = SlotPlan::turnaround(&character.name, &self.settings);
        let outcome = self.run_slot(&remote_id, reference.id, plan).await?;

        if outcome.success {
            let assets = UpdateLibraryAssets {
                master_reference_url: None,
                core_set_generated: true,
                core_set_count: outcome.images.len() as i32,
                generation_status: GENERATION_STATUS_IMAGES_CREATED.to_string(),
                last_image_update: Utc::now(),
            };
            self.write_assets(reference.id, &assets).await?;
        }
        Ok(outcome)
    }

    /// The reference prompt a run would use, without calling the service.
    pub async fn initial_image_prompt(&self, character_id: DbId) -> Result<String, PipelineError> {
        let character = self.find_character(character_id).await?;
        let profile = self
            .characters
            .find_reference_for_character(character_id)
            .await?
            .map(|r| r.profile)
            .unwrap_or_default();
        Ok(build_reference_prompt(&character.name, &profile))
    }

    async fn find_character(&self, character_id: DbId) -> Result<Character, PipelineError> {
        self.characters
            .find_character(character_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "character",
                id: character_id,
            })
    }

    /// Character plus its reference. Generation needs the reference: the
    /// prompt is built from it and metadata rows hang off it.
    async fn load(
        &self,
        character_id: DbId,
    ) -> Result<(Character, CharacterReference), PipelineError> {
        let character = self.find_character(character_id).await?;
        let reference = self
            .characters
            .find_reference_for_character(character_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "character_reference",
                id: character_id,
            })?;
        Ok((character, reference))
    }

    // ---- slots ----

    async fn run_slot(
        &self,
        remote_id: &str,
        reference_id: DbId,
        plan: SlotPlan,
    ) -> Result<StageOutcome, PipelineError> {
        let mut budget = RetryBudget::new(self.settings.slot_attempts);
        let mut last_failure = None;

        while let Some(attempt) = budget.next_attempt() {
            match self
                .attempt_slot(remote_id, reference_id, &plan, attempt)
                .await?
            {
                Ok(images) => {
                    tracing::info!(
                        slot = %plan.slot,
                        attempt,
                        images = images.len(),
                        "Slot accepted",
                    );
                    return Ok(StageOutcome {
                        stage: plan.stage.to_string(),
                        slot: plan.slot,
                        kind: plan.kind,
                        success: true,
                        attempts: attempt,
                        images,
                        error: None,
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        slot = %plan.slot,
                        attempt,
                        failure = ?failure,
                        "Slot attempt rejected",
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let attempts = budget.used();
        let error = match last_failure {
            Some(AttemptFailure::Gate(verdict)) => gate_failure_message(verdict, attempts),
            Some(AttemptFailure::Error(message)) => {
                format!("{} failed after {attempts} attempts: {message}", plan.slot)
            }
            None => format!("{} failed after {attempts} attempts", plan.slot),
        };
        Ok(StageOutcome {
            stage: plan.stage.to_string(),
            slot: plan.slot,
            kind: plan.kind,
            success: false,
            attempts,
            images: Vec::new(),
            error: Some(error),
        })
    }

    /// One attempt: generate, validate every image, record one row per
    /// image. The inner result is the attempt verdict; the outer one only
    /// carries storage errors.
    async fn attempt_slot(
        &self,
        remote_id: &str,
        reference_id: DbId,
        plan: &SlotPlan,
        attempt: u32,
    ) -> Result<Result<Vec<GeneratedImage>, AttemptFailure>, PipelineError> {
        let thresholds = self.settings.thresholds;
        let generation = match self.generate(remote_id, &plan.request).await {
            Ok(images) if !images.is_empty() => Ok(images),
            Ok(_) => Err("service returned no images".to_string()),
            Err(e) => Err(e.to_string()),
        };
        let images = match generation {
            Ok(images) => images,
            Err(message) => {
                let row = plan.attempt(
                    reference_id,
                    attempt,
                    thresholds,
                    None,
                    CandidateScores::default(),
                );
                self.recorder.record_failure(&row, &message).await?;
                return Ok(Err(AttemptFailure::Error(message)));
            }
        };

        let mut rejection = None;
        for image in &images {
            let (scores, failure) = match self.validate(remote_id, &image.image_id).await {
                Ok(report) => {
                    let scores = merge_scores(&report, image);
                    let verdict = evaluate_candidate(&scores, &thresholds);
                    let failure = (!verdict.is_accepted()).then(|| {
                        (
                            rejection_reason(verdict, &scores, &thresholds),
                            AttemptFailure::Gate(verdict),
                        )
                    });
                    (scores, failure)
                }
                Err(e) => {
                    let message = format!("consistency validation failed: {e}");
                    let scores = CandidateScores {
                        quality_score: image.quality_score,
                        consistency_score: image.consistency_score,
                    };
                    (scores, Some((message.clone(), AttemptFailure::Error(message))))
                }
            };

            let row = plan.attempt(reference_id, attempt, thresholds, Some(image), scores);
            match failure {
                None => {
                    self.recorder.record_success(&row).await?;
                }
                Some((message, failure)) => {
                    self.recorder.record_failure(&row, &message).await?;
                    rejection.get_or_insert(failure);
                }
            }
        }

        Ok(match rejection {
            None => Ok(images),
            Some(failure) => Err(failure),
        })
    }

    async fn generate(
        &self,
        remote_id: &str,
        request: &SlotRequest,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError> {
        let attempts = self.settings.transport_attempts;
        let backoff = &self.settings.backoff;
        match request {
            SlotRequest::Initial { prompt } => {
                with_transport_retry("generate_initial_image", attempts, backoff, || {
                    self.library.generate_initial_image(remote_id, prompt)
                })
                .await
                .map(|image| vec![image])
            }
            SlotRequest::Smart(smart) => {
                with_transport_retry("generate_smart_image", attempts, backoff, || {
                    self.library.generate_smart_image(remote_id, smart)
                })
                .await
                .map(|image| vec![image])
            }
            SlotRequest::CoreSet => {
                with_transport_retry("generate_core_set", attempts, backoff, || {
                    self.library.generate_core_set(remote_id)
                })
                .await
            }
            SlotRequest::Turnaround(turnaround) => {
                with_transport_retry("generate_360_set", attempts, backoff, || {
                    self.library.generate_360_set(remote_id, turnaround)
                })
                .await
            }
            SlotRequest::Scene(scene) => {
                with_transport_retry("generate_scene_image", attempts, backoff, || {
                    self.library.generate_scene_image(remote_id, scene)
                })
                .await
                .map(|image| vec![image])
            }
        }
    }

    async fn validate(
        &self,
        remote_id: &str,
        image_id: &str,
    ) -> Result<ConsistencyReport, LibraryApiError> {
        with_transport_retry(
            "validate_consistency",
            self.settings.transport_attempts,
            &self.settings.backoff,
            || self.library.validate_consistency(remote_id, image_id),
        )
        .await
    }

    async fn update_assets(
        &self,
        reference_id: DbId,
        stages: &[StageOutcome],
        reference_image: Option<&GeneratedImage>,
    ) -> Result<(), PipelineError> {
        let core_set = stages
            .iter()
            .find(|s| s.stage == STAGE_CORE_SET && s.success);
        let assets = UpdateLibraryAssets {
            master_reference_url: reference_image.and_then(|i| i.url.clone()),
            core_set_generated: core_set.is_some(),
            core_set_count: core_set.map_or(0, |s| s.images.len() as i32),
            generation_status: if reference_image.is_some() {
                GENERATION_STATUS_IMAGES_CREATED
            } else {
                GENERATION_STATUS_FAILED
            }
            .to_string(),
            last_image_update: Utc::now(),
        };
        self.write_assets(reference_id, &assets).await
    }

    async fn write_assets(
        &self,
        reference_id: DbId,
        assets: &UpdateLibraryAssets,
    ) -> Result<(), PipelineError> {
        if self
            .characters
            .update_library_assets(reference_id, assets)
            .await?
            .is_none()
        {
            tracing::warn!(reference_id, "Character reference vanished before asset update");
        }
        Ok(())
    }
}

/// The remote id of a linked character; standalone generation never syncs.
fn require_link(character: &Character) -> Result<String, PipelineError> {
    character
        .linked_remote_id()
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Config(format!(
                "character {} has no character library entity; sync it first",
                character.id
            ))
        })
}

/// Scores from the validation report, falling back to what the generation
/// response reported.
fn merge_scores(report: &ConsistencyReport, image: &GeneratedImage) -> CandidateScores {
    CandidateScores {
        quality_score: report.quality_score.or(image.quality_score),
        consistency_score: report.consistency_score.or(image.consistency_score),
    }
}

fn rejection_reason(
    verdict: GateVerdict,
    scores: &CandidateScores,
    thresholds: &GateThresholds,
) -> String {
    match verdict {
        GateVerdict::ConsistencyTooLow => format!(
            "consistency score {} below threshold {}",
            scores.consistency_score.unwrap_or(0.0),
            thresholds.consistency
        ),
        GateVerdict::QualityTooLow => format!(
            "quality score {} below threshold {}",
            scores.quality_score.unwrap_or(0.0),
            thresholds.quality
        ),
        GateVerdict::Accepted => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(quality: Option<f64>) -> GeneratedImage {
        GeneratedImage {
            image_id: "img".into(),
            url: None,
            quality_score: quality,
            consistency_score: None,
        }
    }

    #[test]
    fn report_quality_wins_over_generation_quality() {
        let report = ConsistencyReport {
            consistency_score: Some(90.0),
            quality_score: Some(60.0),
            is_consistent: None,
        };
        let scores = merge_scores(&report, &image(Some(95.0)));
        assert_eq!(scores.quality_score, Some(60.0));
        assert_eq!(scores.consistency_score, Some(90.0));
    }

    #[test]
    fn generation_quality_used_when_report_has_none() {
        let report = ConsistencyReport {
            consistency_score: Some(90.0),
            ..Default::default()
        };
        assert_eq!(merge_scores(&report, &image(Some(88.0))).quality_score, Some(88.0));
    }

    #[test]
    fn rejection_reason_names_score_and_threshold() {
        let scores = CandidateScores {
            quality_score: Some(90.0),
            consistency_score: Some(60.0),
        };
        assert_eq!(
            rejection_reason(
                GateVerdict::ConsistencyTooLow,
                &scores,
                &GateThresholds::default()
            ),
            "consistency score 60 below threshold 85"
        );
    }

    #[test]
    fn turnaround_slot_requests_configured_views() {
        let plan = SlotPlan::turnaround("Mara", &PipelineSettings::immediate());
        assert_eq!(plan.stage, STAGE_TURNAROUND);
        assert_eq!(plan.kind, ImageKind::PortfolioItem);
        match plan.request {
            SlotRequest::Turnaround(request) => {
                assert_eq!(request.image_count, Some(8));
                assert_eq!(request.style.as_deref(), Some("character_turnaround"));
                assert_eq!(request.quality_threshold, Some(70.0));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn portfolio_slot_is_named_after_shot() {
        let settings = PipelineSettings::immediate();
        let plan = SlotPlan::portfolio(
            "Mara",
            &CharacterProfile::default(),
            "three-quarter portrait",
            &settings,
        );
        assert_eq!(plan.slot, "portfolio:three-quarter portrait");
        assert_eq!(plan.kind, ImageKind::PortfolioItem);
        match plan.request {
            SlotRequest::Smart(request) => {
                assert_eq!(request.style.as_deref(), Some("character_production"));
                assert_eq!(request.consistency_threshold, Some(85.0));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }
}
