//! Character-library status enums and provider constants.
//!
//! Every enum here is persisted as text. `as_str` gives the stored form and
//! `TryFrom<String>` decodes it back at the row boundary, rejecting values
//! the schema does not know about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Provider label written on every metadata row produced by the remote service.
pub const PROVIDER_CHARACTER_LIBRARY: &str = "character-library";

/// Reference-level generation status after a successful pipeline run.
pub const GENERATION_STATUS_IMAGES_CREATED: &str = "images_created";
/// Reference-level generation status after a failed pipeline run.
pub const GENERATION_STATUS_FAILED: &str = "failed";

// ---------------------------------------------------------------------------
// SyncStatus
// ---------------------------------------------------------------------------

/// Alignment state between a local character and its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synced, or the remote entity is known to be gone.
    Unsynced,
    /// The stored remote id points at the current remote entity.
    Synced,
    /// The last sync attempt failed; see `last_error`.
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Unsynced => "unsynced",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

impl TryFrom<String> for SyncStatus {
    type Error = CoreError;

    // `Self::Error` would be ambiguous with the `Error` variant.
    fn try_from(value: String) -> Result<Self, CoreError> {
        match value.as_str() {
            "unsynced" => Ok(SyncStatus::Unsynced),
            "synced" => Ok(SyncStatus::Synced),
            "error" => Ok(SyncStatus::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown sync status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ImageKind
// ---------------------------------------------------------------------------

/// What a generated image is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    #[serde(rename = "reference")]
    Reference,
    #[serde(rename = "portfolioItem")]
    PortfolioItem,
    #[serde(rename = "scene")]
    Scene,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Reference => "reference",
            ImageKind::PortfolioItem => "portfolioItem",
            ImageKind::Scene => "scene",
        }
    }
}

impl TryFrom<String> for ImageKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "reference" => Ok(ImageKind::Reference),
            "portfolioItem" => Ok(ImageKind::PortfolioItem),
            "scene" => Ok(ImageKind::Scene),
            other => Err(CoreError::Validation(format!("Unknown image kind '{other}'"))),
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ImageStatus
// ---------------------------------------------------------------------------

/// Outcome of a single generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Succeeded,
    Failed,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Succeeded => "succeeded",
            ImageStatus::Failed => "failed",
        }
    }
}

impl TryFrom<String> for ImageStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "succeeded" => Ok(ImageStatus::Succeeded),
            "failed" => Ok(ImageStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown image status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
