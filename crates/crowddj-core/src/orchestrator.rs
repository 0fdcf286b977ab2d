//! **DjOrchestrator** — the main coordination layer.
//!
//! Runs one analysis-act cycle at a time: grab a frame, analyze the crowd,
//! render the DJ line, let the governor gate the playback change, publish
//! the result, then re-arm after a delay chosen from the crowd's energy.
//! Every spawned cycle and every pending sleep carries the generation it
//! was issued under; a `stop()` (or a newer `start()`) bumps the
//! generation, so late results are discarded instead of raced against.

use crate::analysis::AnalysisService;
use crate::config::DjConfig;
use crate::error::{DjError, DjResult};
use crate::events::{DjEvent, EventBus};
use crate::frame::{Frame, FrameSource};
use crate::governor::{ActionKey, AdmissionOutcome, ControlMode, PlaybackGovernor};
use crate::playback::PlaybackService;
use crate::pool::{TrackPool, TrackSelection};
use crate::state::SnapshotStore;
use crate::types::{CrowdReport, DjLine, PlaybackCategory};
use crate::voice::{VoiceService, FALLBACK_LINE};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where the engine is within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Capturing,
    Analyzing,
    Deciding,
    Scheduled,
}

#[derive(Debug)]
struct EngineState {
    phase: CyclePhase,
    /// Run token: bumped by every `start()` and `stop()`, never reused.
    generation: u64,
    /// Successfully analyzed cycles in the current run.
    cycle_count: u64,
    voice: String,
    /// Last concrete track handed to the player, for pick dedupe.
    last_track: Option<String>,
}

/// The engine. All mutable loop state lives behind its locks; external
/// service calls happen without any lock held.
pub struct DjOrchestrator {
    config: DjConfig,
    frames: Arc<dyn FrameSource>,
    analysis: Arc<dyn AnalysisService>,
    voice: Arc<dyn VoiceService>,
    playback: Arc<dyn PlaybackService>,
    pool: TrackPool,
    store: SnapshotStore,
    events: EventBus,
    governor: Mutex<PlaybackGovernor>,
    state: Mutex<EngineState>,
}

impl DjOrchestrator {
    pub fn new(
        config: DjConfig,
        frames: Arc<dyn FrameSource>,
        analysis: Arc<dyn AnalysisService>,
        voice: Arc<dyn VoiceService>,
        playback: Arc<dyn PlaybackService>,
        pool: TrackPool,
        events: EventBus,
    ) -> Self {
        let governor = Mutex::new(PlaybackGovernor::new(config.cooldown));
        let state = Mutex::new(EngineState {
            phase: CyclePhase::Idle,
            generation: 0,
            cycle_count: 0,
            voice: config.default_voice.clone(),
            last_track: None,
        });
        Self {
            config,
            frames,
            analysis,
            voice,
            playback,
            pool,
            store: SnapshotStore::new(),
            events,
            governor,
            state,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn phase(&self) -> CyclePhase {
        self.state.lock().await.phase
    }

    pub async fn is_running(&self) -> bool {
        self.phase().await != CyclePhase::Idle
    }

    /// Begin a run. Silent no-op when already running. Cycle 0 starts
    /// immediately, with no initial delay.
    pub async fn start(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock().await;
            if st.phase != CyclePhase::Idle {
                debug!("start ignored: engine is not idle");
                return;
            }
            st.generation += 1;
            st.cycle_count = 0;
            st.phase = CyclePhase::Capturing;
            st.generation
        };

        // Claim the camera outside the lock; long-latency.
        if let Err(e) = self.frames.open().await {
            warn!("camera open failed: {}", e);
            self.events.publish(DjEvent::Error {
                message: e.to_string(),
            });
            let mut st = self.state.lock().await;
            if st.generation == generation {
                st.phase = CyclePhase::Idle;
            }
            return;
        }

        let raced = { self.state.lock().await.generation != generation };
        if raced {
            // A stop() landed while the open was in flight; its close() could
            // not see our claim, so release it here.
            self.frames.close().await;
            return;
        }

        info!("🎛️ DJ engine started");
        self.events.publish(DjEvent::Started);
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run(generation).await });
    }

    /// Stop the loop and invalidate all in-flight work. Idempotent; safe
    /// while a cycle's external calls are still outstanding (their results
    /// will be discarded, not aborted).
    pub async fn stop(&self) {
        {
            let mut st = self.state.lock().await;
            st.generation += 1;
            st.phase = CyclePhase::Idle;
        }
        self.frames.close().await;
        info!("🛑 DJ engine stopped");
        self.events.publish(DjEvent::Stopped);
    }

    /// Switch the DJ voice character. Takes effect next cycle; when a report
    /// is already stored, the line is re-rendered and republished right
    /// away, without re-running analysis.
    pub async fn set_voice(&self, character: impl Into<String>) {
        let character = character.into();
        {
            let mut st = self.state.lock().await;
            st.voice = character.clone();
        }
        info!(voice = %character, "DJ voice changed");

        if let Some((report, _)) = self.store.current().await {
            match self.voice.render(&report, &character).await {
                Ok(line) => {
                    self.store.replace(report.clone(), line.clone()).await;
                    self.events.publish(DjEvent::analysis_update(&report, &line));
                }
                Err(e) => warn!("re-render under new voice failed: {}", e),
            }
        }
    }

    /// Hand the player back to the user (or back to the engine).
    pub async fn set_mode(&self, mode: ControlMode) {
        self.governor.lock().await.set_mode(mode);
        info!(?mode, "control mode changed");
    }

    /// Grab a frame outside the cycle cadence (observer-requested preview).
    pub async fn current_frame(&self) -> DjResult<Frame> {
        self.frames.grab().await
    }

    /// The last published pair as a replayable event, for an observer that
    /// connects mid-run. `None` before the first successful cycle.
    pub async fn observer_snapshot(&self) -> Option<DjEvent> {
        self.store
            .current()
            .await
            .map(|(report, line)| DjEvent::analysis_update(&report, &line))
    }

    async fn stale(&self, generation: u64) -> bool {
        self.state.lock().await.generation != generation
    }

    /// Cycle loop for one run. Exits as soon as its generation goes stale.
    async fn run(self: Arc<Self>, generation: u64) {
        loop {
            let delay = match self.run_cycle(generation).await {
                Some(delay) => delay,
                None => return,
            };
            {
                let mut st = self.state.lock().await;
                if st.generation != generation {
                    return;
                }
                st.phase = CyclePhase::Scheduled;
            }
            debug!(delay_secs = delay.as_secs(), "cycle re-armed");
            tokio::time::sleep(delay).await;
            if self.stale(generation).await {
                return;
            }
        }
    }

    /// One capture→analyze→announce→act→publish pass. Returns the delay
    /// before the next cycle, or `None` when this run went stale mid-flight.
    async fn run_cycle(&self, generation: u64) -> Option<Duration> {
        {
            let mut st = self.state.lock().await;
            if st.generation != generation {
                return None;
            }
            st.phase = CyclePhase::Capturing;
        }

        let frame = match self.frames.grab().await {
            Ok(frame) => frame,
            Err(e) => return self.fail_cycle(generation, e).await,
        };

        {
            let mut st = self.state.lock().await;
            if st.generation != generation {
                return None;
            }
            st.phase = CyclePhase::Analyzing;
        }

        let report = match self.analysis.analyze(&frame).await {
            Ok(report) => report,
            Err(e) => return self.fail_cycle(generation, e).await,
        };

        let (forced, character) = {
            let mut st = self.state.lock().await;
            if st.generation != generation {
                return None;
            }
            st.phase = CyclePhase::Deciding;
            st.cycle_count += 1;
            let forced =
                self.config.force_every > 0 && st.cycle_count % self.config.force_every == 0;
            (forced, st.voice.clone())
        };
        debug!(
            energy = report.energy_level,
            people = report.people_count,
            category = report.recommended_category.as_str(),
            forced,
            "crowd analyzed"
        );

        let line = match self.voice.render(&report, &character).await {
            Ok(line) => line,
            Err(e) => {
                warn!("voice render failed: {}", e);
                DjLine::text_only(FALLBACK_LINE)
            }
        };

        self.apply_playback(generation, &report, forced).await;
        if self.stale(generation).await {
            return None;
        }

        {
            // Publish under the state lock so a concurrent stop() either
            // happens-before this publish or fully invalidates it.
            let st = self.state.lock().await;
            if st.generation != generation {
                return None;
            }
            self.store.replace(report.clone(), line.clone()).await;
            self.events.publish(DjEvent::analysis_update(&report, &line));
        }

        Some(self.config.delay_for(report.tier()))
    }

    /// Absorb a per-cycle failure: surface it, then re-arm conservatively.
    async fn fail_cycle(&self, generation: u64, err: DjError) -> Option<Duration> {
        warn!("cycle failed: {}", err);
        if self.stale(generation).await {
            return None;
        }
        self.events.publish(DjEvent::Error {
            message: err.to_string(),
        });
        Some(self.config.fallback_delay)
    }

    /// Gate and apply this cycle's playback proposal.
    async fn apply_playback(&self, generation: u64, report: &CrowdReport, forced: bool) {
        let proposed = if report.has_people {
            ActionKey::Category(report.recommended_category)
        } else {
            ActionKey::Paused
        };

        let outcome = {
            // Decide under the state lock: a cycle that went stale must not
            // advance the admission record of the next run.
            let st = self.state.lock().await;
            if st.generation != generation {
                return;
            }
            let mut governor = self.governor.lock().await;
            governor.decide(proposed, Instant::now(), forced)
        };

        match outcome {
            AdmissionOutcome::Fire => match proposed {
                ActionKey::Paused => {
                    info!("floor is empty, pausing playback");
                    if let Err(e) = self.playback.pause().await {
                        warn!("pause failed: {}", e);
                    }
                }
                ActionKey::Category(category) => self.play_from(generation, category).await,
            },
            AdmissionOutcome::Reinforce => {
                // Same category as last cycle: only touch the player if it
                // fell silent (e.g. the user paused it by hand).
                match self.playback.is_playing().await {
                    Ok(true) => debug!("category unchanged, playback confirmed"),
                    Ok(false) => {
                        info!("category unchanged but player silent, restarting");
                        if let ActionKey::Category(category) = proposed {
                            self.play_from(generation, category).await;
                        }
                    }
                    Err(e) => warn!("playback status check failed: {}", e),
                }
            }
            AdmissionOutcome::Skip(reason) => {
                debug!(?reason, "playback change skipped");
            }
        }
    }

    /// Pick from the category's pool (never repeating the previous track
    /// when an alternative exists) and hand it to the player.
    async fn play_from(&self, generation: u64, category: PlaybackCategory) {
        let selection = {
            let st = self.state.lock().await;
            let mut rng = rand::thread_rng();
            self.pool.pick(category, st.last_track.as_deref(), &mut rng)
        };
        let Some(selection) = selection else {
            debug!(category = category.as_str(), "no tracks available");
            return;
        };

        match self.playback.play(&selection).await {
            Ok(()) => {
                info!(category = category.as_str(), ?selection, "🎵 playback changed");
                if let TrackSelection::Track(uri) = &selection {
                    let mut st = self.state.lock().await;
                    if st.generation == generation {
                        st.last_track = Some(uri.clone());
                    }
                }
            }
            Err(e) => warn!("playback change failed: {}", e),
        }
    }
}
