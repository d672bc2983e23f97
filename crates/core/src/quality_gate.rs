//! Acceptance gate for generated image candidates.
//!
//! A candidate passes only when both the remote consistency score and the
//! quality score meet their thresholds. Scores are on a 0-100 scale.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Default thresholds
// ---------------------------------------------------------------------------

/// Minimum quality score a candidate must reach.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 70.0;
/// Minimum consistency score (against the reference image) a candidate must reach.
pub const DEFAULT_CONSISTENCY_THRESHOLD: f64 = 85.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Thresholds applied to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub quality: f64,
    pub consistency: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY_THRESHOLD,
            consistency: DEFAULT_CONSISTENCY_THRESHOLD,
        }
    }
}

/// Observed scores for one candidate. A score the remote did not report is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScores {
    pub quality_score: Option<f64>,
    pub consistency_score: Option<f64>,
}

/// Result of evaluating a candidate against [`GateThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Accepted,
    /// Consistency fell short (checked first; quality may also be short).
    ConsistencyTooLow,
    QualityTooLow,
}

impl GateVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, GateVerdict::Accepted)
    }

    /// Name of the gate that rejected the candidate, used in error messages.
    pub fn gate_name(self) -> Option<&'static str> {
        match self {
            GateVerdict::Accepted => None,
            GateVerdict::ConsistencyTooLow => Some("consistency"),
            GateVerdict::QualityTooLow => Some("quality"),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a candidate. Missing scores count as zero.
pub fn evaluate_candidate(scores: &CandidateScores, thresholds: &GateThresholds) -> GateVerdict {
    let consistency = scores.consistency_score.unwrap_or(0.0);
    let quality = scores.quality_score.unwrap_or(0.0);

    if consistency < thresholds.consistency {
        GateVerdict::ConsistencyTooLow
    } else if quality < thresholds.quality {
        GateVerdict::QualityTooLow
    } else {
        GateVerdict::Accepted
    }
}

/// Message reported when a slot exhausts its budget on gate rejections.
pub fn gate_failure_message(verdict: GateVerdict, attempts: u32) -> String {
    let gate = verdict.gate_name().unwrap_or("quality");
    format!("{gate} gate not met after {attempts} attempts")
}
