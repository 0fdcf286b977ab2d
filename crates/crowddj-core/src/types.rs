//! Core data model: per-cycle crowd reports, spoken DJ lines, and the
//! playback category / energy tier tables.

use serde::{Deserialize, Serialize};

/// Closed set of playback buckets the floor can be steered toward.
///
/// Anything the vision model suggests outside this set resolves to the
/// configured default category instead of failing the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackCategory {
    Chill,
    Groove,
    Party,
}

impl PlaybackCategory {
    /// Parse a model-supplied label. Unrecognized labels map to `fallback`.
    pub fn parse_or(label: &str, fallback: PlaybackCategory) -> Self {
        match label.trim().to_lowercase().as_str() {
            "chill" | "lofi" | "ambient" | "low" => Self::Chill,
            "groove" | "disco" | "pop" | "salsa" | "rock" | "mid" => Self::Groove,
            "party" | "reggaeton" | "edm" | "techno" | "dance" | "high" => Self::Party,
            _ => fallback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chill => "chill",
            Self::Groove => "groove",
            Self::Party => "party",
        }
    }
}

/// Coarse energy bucket derived from the 1-10 energy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTier {
    Low,
    Mid,
    High,
}

/// Map a 1-10 energy level onto its tier.
///
/// Reports clamp the level before this is consulted, so out-of-range
/// upstream values cannot reach the `High` arm by accident.
pub fn energy_tier(level: u8) -> EnergyTier {
    match level {
        0..=4 => EnergyTier::Low,
        5..=7 => EnergyTier::Mid,
        _ => EnergyTier::High,
    }
}

fn default_energy() -> u8 {
    5
}

/// Structured crowd report produced by the vision analysis each cycle.
///
/// Immutable once built: the next cycle supersedes it, nothing mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrowdReport {
    #[serde(default)]
    pub has_people: bool,
    #[serde(default)]
    pub people_count: u32,
    #[serde(default)]
    pub description: String,
    /// Crowd energy on a 1-10 scale.
    #[serde(default = "default_energy")]
    pub energy_level: u8,
    #[serde(default)]
    pub dancing: bool,
    #[serde(default)]
    pub bored: bool,
    /// Resolved playback bucket; never an out-of-set value.
    pub recommended_category: PlaybackCategory,
}

impl CrowdReport {
    /// Clamps the energy level into the valid 1-10 range.
    pub fn clamp(&mut self) {
        self.energy_level = self.energy_level.clamp(1, 10);
    }

    /// The energy tier this report lands in.
    pub fn tier(&self) -> EnergyTier {
        energy_tier(self.energy_level)
    }
}

/// One spoken DJ line, paired 1:1 with the report that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DjLine {
    pub text: String,
    /// Rendered audio bytes (MP3/WAV). `None` when TTS was skipped or failed
    /// and the line is text-only.
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
}

impl DjLine {
    /// A text-only line with no rendered audio.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
        }
    }
}
