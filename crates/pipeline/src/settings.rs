use nm_core::prompt::DEFAULT_PORTFOLIO_SHOTS;
use nm_core::quality_gate::GateThresholds;
use nm_core::retry::{BackoffConfig, DEFAULT_SLOT_ATTEMPTS, DEFAULT_TRANSPORT_ATTEMPTS};
use nm_library::LibraryConfig;

/// Views requested per 360 turnaround set.
pub const DEFAULT_TURNAROUND_IMAGES: u32 = 8;
pub const DEFAULT_TURNAROUND_STYLE: &str = "character_turnaround";

/// Tunables shared by the sync and generation orchestrators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Attempts per remote call.
    pub transport_attempts: u32,
    pub backoff: BackoffConfig,
    /// Generation attempts per slot.
    pub slot_attempts: u32,
    pub thresholds: GateThresholds,
    /// Parallel character syncs within one project sync.
    pub sync_concurrency: usize,
    pub style: String,
    /// One portfolio slot is generated per shot.
    pub portfolio_shots: Vec<String>,
    pub turnaround_images: u32,
    pub turnaround_style: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&LibraryConfig::default())
    }
}

impl From<&LibraryConfig> for PipelineSettings {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            transport_attempts: config.retry_attempts.max(1),
            backoff: config.backoff(),
            slot_attempts: config.max_retries.max(1),
            thresholds: config.thresholds(),
            sync_concurrency: config.sync_concurrency.max(1),
            style: config.default_style.clone(),
            portfolio_shots: DEFAULT_PORTFOLIO_SHOTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            turnaround_images: DEFAULT_TURNAROUND_IMAGES,
            turnaround_style: DEFAULT_TURNAROUND_STYLE.to_string(),
        }
    }
}

impl PipelineSettings {
    /// Default budgets with no backoff sleeps.
    pub fn immediate() -> Self {
        Self {
            transport_attempts: DEFAULT_TRANSPORT_ATTEMPTS,
            slot_attempts: DEFAULT_SLOT_ATTEMPTS,
            backoff: BackoffConfig::immediate(),
            ..Self::default()
        }
    }
}
