//! Engine configuration loaded from `.env` / process environment.
//!
//! Two layers: [`DjConfig`] holds the loop tunables (cooldowns, delays,
//! cadence) and always loads with sane defaults; [`ServiceConfig`] holds
//! endpoints and credentials for the external backends and fails fast at
//! startup when a required key is missing. Nothing here is ever re-read
//! mid-cycle.

use crate::error::{DjError, DjResult};
use crate::types::{EnergyTier, PlaybackCategory};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_COOLDOWN_SECS: u64 = 15;
const DEFAULT_FORCE_EVERY: u64 = 3;
const DEFAULT_DELAY_LOW_SECS: u64 = 20;
const DEFAULT_DELAY_MID_SECS: u64 = 40;
const DEFAULT_DELAY_HIGH_SECS: u64 = 60;
const DEFAULT_FALLBACK_DELAY_SECS: u64 = 90;
const DEFAULT_VOICE: &str = "hype";

/// Loop tunables, loaded from environment.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | CROWDDJ_COOLDOWN_SECS | 15 | Minimum seconds between non-forced track changes. |
/// | CROWDDJ_FORCE_EVERY | 3 | Every Nth analyzed cycle fires regardless of cooldown (0 disables). |
/// | CROWDDJ_DELAY_LOW_SECS | 20 | Re-arm delay when energy is 1-4 (calm floors are rechecked sooner). |
/// | CROWDDJ_DELAY_MID_SECS | 40 | Re-arm delay when energy is 5-7. |
/// | CROWDDJ_DELAY_HIGH_SECS | 60 | Re-arm delay when energy is 8-10. |
/// | CROWDDJ_FALLBACK_DELAY_SECS | 90 | Re-arm delay after a failed cycle; longer than any adaptive delay. |
/// | CROWDDJ_DEFAULT_VOICE | hype | DJ voice character at startup. |
/// | CROWDDJ_DEFAULT_CATEGORY | chill | Substitute for unrecognized category labels. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DjConfig {
    pub cooldown: Duration,
    pub force_every: u64,
    pub delay_low: Duration,
    pub delay_mid: Duration,
    pub delay_high: Duration,
    pub fallback_delay: Duration,
    pub default_voice: String,
    pub default_category: PlaybackCategory,
}

impl Default for DjConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            force_every: DEFAULT_FORCE_EVERY,
            delay_low: Duration::from_secs(DEFAULT_DELAY_LOW_SECS),
            delay_mid: Duration::from_secs(DEFAULT_DELAY_MID_SECS),
            delay_high: Duration::from_secs(DEFAULT_DELAY_HIGH_SECS),
            fallback_delay: Duration::from_secs(DEFAULT_FALLBACK_DELAY_SECS),
            default_voice: DEFAULT_VOICE.to_string(),
            default_category: PlaybackCategory::Chill,
        }
    }
}

impl DjConfig {
    /// Load tunables from environment. Unset or invalid => defaults.
    pub fn from_env() -> Self {
        Self {
            cooldown: env_secs("CROWDDJ_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS),
            force_every: env_u64("CROWDDJ_FORCE_EVERY", DEFAULT_FORCE_EVERY),
            delay_low: env_secs("CROWDDJ_DELAY_LOW_SECS", DEFAULT_DELAY_LOW_SECS),
            delay_mid: env_secs("CROWDDJ_DELAY_MID_SECS", DEFAULT_DELAY_MID_SECS),
            delay_high: env_secs("CROWDDJ_DELAY_HIGH_SECS", DEFAULT_DELAY_HIGH_SECS),
            fallback_delay: env_secs("CROWDDJ_FALLBACK_DELAY_SECS", DEFAULT_FALLBACK_DELAY_SECS),
            default_voice: env_string("CROWDDJ_DEFAULT_VOICE", DEFAULT_VOICE),
            default_category: PlaybackCategory::parse_or(
                &env_string("CROWDDJ_DEFAULT_CATEGORY", "chill"),
                PlaybackCategory::Chill,
            ),
        }
    }

    /// The re-arm delay for a given energy tier.
    pub fn delay_for(&self, tier: EnergyTier) -> Duration {
        match tier {
            EnergyTier::Low => self.delay_low,
            EnergyTier::Mid => self.delay_mid,
            EnergyTier::High => self.delay_high,
        }
    }
}

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PHRASE_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_PLAYLIST_ID: &str = "37i9dQZF1DX9C8KzGEUKV4";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Endpoints and credentials for the production backends.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | CROWDDJ_LLM_API_URL | https://api.openai.com/v1 | OpenAI-compatible base URL (vision, phrase, TTS). |
/// | CROWDDJ_LLM_API_KEY | — (required) | Bearer key for the LLM endpoints. |
/// | CROWDDJ_VISION_MODEL | gpt-4o-mini | Vision analysis model. |
/// | CROWDDJ_PHRASE_MODEL | gpt-4o-mini | DJ line model. |
/// | CROWDDJ_TTS_MODEL | tts-1 | TTS model. |
/// | CROWDDJ_SPOTIFY_TOKEN | — (required) | Spotify Web API bearer token. |
/// | CROWDDJ_PLAYLIST_ID | 37i9dQZF1DX9C8KzGEUKV4 | Source playlist for the energy pools. |
/// | CROWDDJ_FRAME_URL | — (required) | Camera snapshot URL (JPEG per GET). |
/// | CROWDDJ_BIND_ADDR | 0.0.0.0:5000 | Gateway listen address. |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub vision_model: String,
    pub phrase_model: String,
    pub tts_model: String,
    pub spotify_token: String,
    pub playlist_id: String,
    pub frame_url: String,
    pub bind_addr: String,
}

impl ServiceConfig {
    /// Load from environment. Missing required keys are a startup error,
    /// never a mid-cycle one.
    pub fn from_env() -> DjResult<Self> {
        Ok(Self {
            llm_api_url: env_string("CROWDDJ_LLM_API_URL", DEFAULT_LLM_API_URL),
            llm_api_key: env_required("CROWDDJ_LLM_API_KEY")?,
            vision_model: env_string("CROWDDJ_VISION_MODEL", DEFAULT_VISION_MODEL),
            phrase_model: env_string("CROWDDJ_PHRASE_MODEL", DEFAULT_PHRASE_MODEL),
            tts_model: env_string("CROWDDJ_TTS_MODEL", DEFAULT_TTS_MODEL),
            spotify_token: env_required("CROWDDJ_SPOTIFY_TOKEN")?,
            playlist_id: env_string("CROWDDJ_PLAYLIST_ID", DEFAULT_PLAYLIST_ID),
            frame_url: env_required("CROWDDJ_FRAME_URL")?,
            bind_addr: env_string("CROWDDJ_BIND_ADDR", DEFAULT_BIND_ADDR),
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(name, default))
}

fn env_required(name: &str) -> DjResult<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DjError::Config(format!("{} is required", name)))
}
