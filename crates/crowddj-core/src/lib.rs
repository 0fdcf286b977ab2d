//! # crowddj Core - Crowd-Reactive DJ Orchestration
//!
//! This crate implements the analysis-act cycle behind crowddj: a camera
//! snapshot of the floor is analyzed into a coarse energy report, a DJ line
//! is generated and rendered, and playback is nudged toward the matching
//! energy pool -- one cycle at a time, re-armed on an adaptive delay.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DJ Orchestrator                        │
//! │  ┌────────────┐   ┌──────────────┐   ┌─────────────────┐    │
//! │  │ FrameSource│ → │ VisionAnalyst│ → │    LlmVoice     │    │
//! │  │ (snapshot) │   │ (crowd JSON) │   │ (line + TTS)    │    │
//! │  └────────────┘   └──────┬───────┘   └────────┬────────┘    │
//! │                          ↓                    ↓             │
//! │  ┌──────────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │ PlaybackGovernor │→ │ SpotifyPlayer│  │ SnapshotStore│   │
//! │  │ (cooldown/dedupe)│  │  (play/pause)│  │  + EventBus  │   │
//! │  └──────────────────┘  └──────────────┘  └──────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod governor;
pub mod orchestrator;
pub mod playback;
pub mod pool;
pub mod state;
pub mod types;
pub mod voice;

pub use analysis::{AnalysisService, VisionAnalyst};
pub use config::{DjConfig, ServiceConfig};
pub use error::{DjError, DjResult};
pub use events::{DjEvent, EventBus};
pub use frame::{Frame, FrameSource, HttpFrameSource, StaticFrameSource};
pub use governor::{
    ActionKey, AdmissionOutcome, ControlMode, PlaybackGovernor, SkipReason,
};
pub use orchestrator::{CyclePhase, DjOrchestrator};
pub use playback::{PlaybackService, SpotifyPlayer};
pub use pool::{TrackPool, TrackSelection};
pub use state::SnapshotStore;
pub use types::{energy_tier, CrowdReport, DjLine, EnergyTier, PlaybackCategory};
pub use voice::{character_voice, LlmVoice, PlaceholderVoice, VoiceService, FALLBACK_LINE};
