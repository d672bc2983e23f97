//! Character profile and generation prompt builders.
//!
//! [`CharacterProfile`] is the descriptive payload stored on a character
//! reference. The builders turn it into prompts for the remote service and
//! never fail: absent fields are skipped.

use serde::{Deserialize, Serialize};

/// Framing appended to every reference prompt so reference images line up.
pub const REFERENCE_FRAMING: &str = "chest-to-mid-thigh crop, equal headroom, \
     subject pinned to the centre third, matched eye level, 35mm lens";

/// Lighting used when the profile does not specify one.
pub const DEFAULT_LIGHTING: &str = "soft, even three-point lighting";

/// Portfolio shots generated after the reference image is accepted.
pub const DEFAULT_PORTFOLIO_SHOTS: &[&str] = &[
    "three-quarter portrait",
    "full-body neutral stance",
    "close-up expression study",
];

/// Descriptive data for one character, as stored on its reference record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterProfile {
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub ethnicity: Option<String>,
    pub body_type: Option<String>,
    pub distinctive_features: Option<String>,
    pub hair: Option<String>,
    pub eye_color: Option<String>,
    pub face: Option<String>,
    pub height: Option<String>,
    pub description: Option<String>,
    pub wardrobe: Option<String>,
    pub signature_style: Option<String>,
    pub personality: Option<String>,
    pub biography: Option<String>,
    pub era: Option<String>,
    pub setting: Option<String>,
    pub locale: Option<String>,
    pub cinematography_style: Option<String>,
    pub color_palette: Option<String>,
    pub lighting: Option<String>,
}

/// Join the non-empty, trimmed parts with `", "`.
fn join_present<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the prompt for a character's canonical reference image.
pub fn build_reference_prompt(name: &str, profile: &CharacterProfile) -> String {
    let name = if name.trim().is_empty() {
        "the character"
    } else {
        name.trim()
    };
    let age = profile.age.map(|a| format!("{a} years old"));

    let physical = join_present([
        profile.gender.as_deref(),
        age.as_deref(),
        profile.ethnicity.as_deref(),
        profile.body_type.as_deref(),
        profile.distinctive_features.as_deref(),
        profile.hair.as_deref(),
        profile.face.as_deref(),
        profile.description.as_deref(),
    ]);
    let attire = join_present([
        profile.wardrobe.as_deref(),
        profile.signature_style.as_deref(),
    ]);
    let context = join_present([
        profile.era.as_deref(),
        profile.setting.as_deref(),
        profile.locale.as_deref(),
    ]);
    let personality = profile.personality.as_deref().unwrap_or("").trim();

    let mut core = vec![format!(
        "Ultra-detailed, photorealistic studio reference of {name}"
    )];
    if !physical.is_empty() {
        core.push(format!("({physical})"));
    }
    if !attire.is_empty() {
        core.push(format!("wardrobe: {attire}"));
    }
    if !personality.is_empty() {
        core.push(format!("personality cues: {personality}"));
    }
    if !context.is_empty() {
        core.push(format!("context: {context}"));
    }

    let mut look = Vec::new();
    if let Some(style) = non_empty(profile.cinematography_style.as_deref()) {
        look.push(format!("cinematography: {style}"));
    }
    if let Some(palette) = non_empty(profile.color_palette.as_deref()) {
        look.push(format!("color: {palette}"));
    }
    let lighting = non_empty(profile.lighting.as_deref()).unwrap_or(DEFAULT_LIGHTING);
    look.push(format!("lighting: {lighting}"));
    look.push("neutral seamless studio background".to_string());
    look.push("high dynamic range, crisp focus, accurate skin tones, no text or watermarks".into());

    format!(
        "{}. {}. Shot details: {REFERENCE_FRAMING}.",
        core.join("; "),
        look.join("; ")
    )
}

/// Build the prompt for a style-conditioned portfolio shot.
pub fn build_portfolio_prompt(name: &str, profile: &CharacterProfile, shot: &str) -> String {
    let attire = join_present([
        profile.wardrobe.as_deref(),
        profile.signature_style.as_deref(),
    ]);
    let mut prompt = format!("{shot} of {}", name.trim());
    if !attire.is_empty() {
        prompt.push_str(&format!(", wearing {attire}"));
    }
    if let Some(lighting) = non_empty(profile.lighting.as_deref()) {
        prompt.push_str(&format!(", {lighting}"));
    }
    prompt.push_str(", consistent with the master reference");
    prompt
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
