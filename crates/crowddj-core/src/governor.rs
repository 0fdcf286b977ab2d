//! **PlaybackGovernor** — admission control for automated playback changes.
//!
//! Pure decision logic: given a proposed action and a clock reading, decide
//! whether the change may fire now. Keeps automated changes from fighting
//! the user (override mode), from thrashing (cooldown) and from re-issuing
//! no-ops (same category, already paused). No I/O; the clock is injected.

use crate::types::PlaybackCategory;
use std::time::{Duration, Instant};
use tracing::debug;

/// What a cycle proposes to do to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKey {
    /// Steer playback toward this category's pool.
    Category(PlaybackCategory),
    /// Fall silent because the floor is empty.
    Paused,
}

/// Who is in charge of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// The engine drives playback.
    #[default]
    Automatic,
    /// Observe and announce only; never touch playback.
    UserOverride,
}

impl ControlMode {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "automatic" | "auto" => Some(Self::Automatic),
            "user_override" | "user" | "manual" => Some(Self::UserOverride),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UserOverride,
    CooldownActive,
    AlreadyPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The action may fire now; the record has been advanced.
    Fire,
    /// Same category as last time: confirm playback is still audible, do not
    /// count this as a new firing.
    Reinforce,
    Skip(SkipReason),
}

/// Cooldown + dedupe gate in front of the player.
#[derive(Debug)]
pub struct PlaybackGovernor {
    cooldown: Duration,
    mode: ControlMode,
    last_key: Option<ActionKey>,
    last_fired_at: Option<Instant>,
}

impl PlaybackGovernor {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            mode: ControlMode::Automatic,
            last_key: None,
            last_fired_at: None,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    /// Decide whether `proposed` may fire at `now`. Callers hand in a
    /// non-decreasing `now`, so `last_fired_at` never moves backwards.
    ///
    /// Pausing is a special case: an empty floor should fall silent promptly,
    /// so it bypasses the cooldown, fires at most once until something else
    /// plays again, and does not consume the category-change cooldown.
    pub fn decide(&mut self, proposed: ActionKey, now: Instant, forced: bool) -> AdmissionOutcome {
        if self.mode == ControlMode::UserOverride {
            return AdmissionOutcome::Skip(SkipReason::UserOverride);
        }

        if proposed == ActionKey::Paused {
            if self.last_key == Some(ActionKey::Paused) {
                return AdmissionOutcome::Skip(SkipReason::AlreadyPaused);
            }
            self.last_key = Some(ActionKey::Paused);
            return AdmissionOutcome::Fire;
        }

        if self.last_key == Some(proposed) {
            return AdmissionOutcome::Reinforce;
        }

        if !forced {
            if let Some(fired_at) = self.last_fired_at {
                let elapsed = now.saturating_duration_since(fired_at);
                if elapsed < self.cooldown {
                    debug!(?proposed, ?elapsed, "cooldown active");
                    return AdmissionOutcome::Skip(SkipReason::CooldownActive);
                }
            }
        }

        self.last_key = Some(proposed);
        self.last_fired_at = Some(now);
        AdmissionOutcome::Fire
    }
}
