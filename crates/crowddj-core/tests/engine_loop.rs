//! Integration tests for the cycle loop, with canned collaborators.
//!
//! Delays are shrunk to milliseconds so the loop can be observed in real
//! time; every wait is bounded by a timeout.

use async_trait::async_trait;
use crowddj_core::{
    AnalysisService, CrowdReport, DjConfig, DjError, DjEvent, DjLine, DjOrchestrator, DjResult,
    EventBus, Frame, FrameSource, PlaybackCategory, PlaybackService, StaticFrameSource,
    TrackPool, TrackSelection, VoiceService,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::timeout;

fn test_config() -> DjConfig {
    DjConfig {
        cooldown: Duration::from_secs(1000),
        force_every: 0,
        delay_low: Duration::from_millis(10),
        delay_mid: Duration::from_millis(20),
        delay_high: Duration::from_millis(30),
        fallback_delay: Duration::from_millis(200),
        ..DjConfig::default()
    }
}

fn report(energy: u8, people: u32, category: PlaybackCategory) -> CrowdReport {
    CrowdReport {
        has_people: people > 0,
        people_count: people,
        description: "test floor".to_string(),
        energy_level: energy,
        dancing: energy >= 8,
        bored: energy <= 3,
        recommended_category: category,
    }
}

/// Replays a script of reports/failures, then repeats a default report.
struct ScriptedAnalyst {
    script: Mutex<VecDeque<Option<CrowdReport>>>,
    default: CrowdReport,
    calls: AtomicUsize,
}

impl ScriptedAnalyst {
    fn new(script: Vec<Option<CrowdReport>>, default: CrowdReport) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            default,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalyst {
    async fn analyze(&self, _frame: &Frame) -> DjResult<CrowdReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(Some(report)) => Ok(report),
            Some(None) => Err(DjError::Analysis("vision backend offline".to_string())),
            None => Ok(self.default.clone()),
        }
    }
}

/// Parks every analyze() call until released; for in-flight cancellation.
struct GatedAnalyst {
    release: Notify,
    calls: AtomicUsize,
    default: CrowdReport,
}

#[async_trait]
impl AnalysisService for GatedAnalyst {
    async fn analyze(&self, _frame: &Frame) -> DjResult<CrowdReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(self.default.clone())
    }
}

/// Text-only voice that tags the line with the character it rendered as.
#[derive(Default)]
struct EchoVoice {
    calls: AtomicUsize,
}

#[async_trait]
impl VoiceService for EchoVoice {
    async fn render(&self, report: &CrowdReport, character: &str) -> DjResult<DjLine> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DjLine::text_only(format!(
            "{} says: energy {}",
            character, report.energy_level
        )))
    }
}

#[derive(Default)]
struct RecordingPlayer {
    plays: Mutex<Vec<TrackSelection>>,
    pauses: AtomicUsize,
    playing: AtomicBool,
}

#[async_trait]
impl PlaybackService for RecordingPlayer {
    async fn play(&self, selection: &TrackSelection) -> DjResult<()> {
        self.plays.lock().await.push(selection.clone());
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> DjResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_playing(&self) -> DjResult<bool> {
        Ok(self.playing.load(Ordering::SeqCst))
    }
}

/// Camera whose open() always fails.
struct DeadCamera;

#[async_trait]
impl FrameSource for DeadCamera {
    async fn open(&self) -> DjResult<()> {
        Err(DjError::Capture("cannot open the camera".to_string()))
    }

    async fn grab(&self) -> DjResult<Frame> {
        Err(DjError::Capture("cannot open the camera".to_string()))
    }

    async fn close(&self) {}
}

fn catalog() -> TrackPool {
    TrackPool::from_catalog((0..9).map(|i| format!("spotify:track:{}", i)).collect())
}

fn engine_with(
    config: DjConfig,
    analyst: Arc<dyn AnalysisService>,
    voice: Arc<dyn VoiceService>,
    player: Arc<dyn PlaybackService>,
) -> Arc<DjOrchestrator> {
    let frames = Arc::new(StaticFrameSource::new(vec![0xFF, 0xD8, 0xFF]));
    Arc::new(DjOrchestrator::new(
        config,
        frames,
        analyst,
        voice,
        player,
        catalog(),
        EventBus::new(),
    ))
}

async fn next_event(rx: &mut broadcast::Receiver<DjEvent>) -> DjEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

async fn next_update(rx: &mut broadcast::Receiver<DjEvent>) -> (CrowdReport, String) {
    loop {
        if let DjEvent::AnalysisUpdate { report, phrase, .. } = next_event(rx).await {
            return (report, phrase);
        }
    }
}

#[tokio::test]
async fn full_cycle_publishes_and_fires_playback() {
    let analyst = ScriptedAnalyst::new(Vec::new(), report(9, 5, PlaybackCategory::Party));
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst.clone(), voice.clone(), player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;

    assert!(matches!(next_event(&mut rx).await, DjEvent::Started));
    let (published, phrase) = next_update(&mut rx).await;
    assert_eq!(published.energy_level, 9);
    assert!(phrase.contains("hype"), "default character speaks: {}", phrase);

    engine.stop().await;

    // First ever proposal fired; later same-category cycles only reinforce.
    assert_eq!(player.plays.lock().await.len(), 1);
    assert_eq!(player.pauses.load(Ordering::SeqCst), 0);
    assert!(!engine.is_running().await);
}

#[tokio::test]
async fn failed_analysis_skips_publish_and_resumes() {
    let analyst = ScriptedAnalyst::new(
        vec![None, Some(report(3, 2, PlaybackCategory::Chill))],
        report(3, 2, PlaybackCategory::Chill),
    );
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst.clone(), voice.clone(), player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;

    assert!(matches!(next_event(&mut rx).await, DjEvent::Started));
    assert!(matches!(next_event(&mut rx).await, DjEvent::Error { .. }));
    // The failed cycle published nothing and spoke nothing.
    assert!(engine.observer_snapshot().await.is_none());
    assert_eq!(voice.calls.load(Ordering::SeqCst), 0);

    // The loop re-armed on the fallback delay and recovered.
    let (published, _) = next_update(&mut rx).await;
    assert_eq!(published.energy_level, 3);
    assert!(engine.observer_snapshot().await.is_some());

    engine.stop().await;
}

#[tokio::test]
async fn stop_discards_in_flight_results() {
    let analyst = Arc::new(GatedAnalyst {
        release: Notify::new(),
        calls: AtomicUsize::new(0),
        default: report(7, 4, PlaybackCategory::Groove),
    });
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst.clone(), voice.clone(), player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;

    // Wait for the cycle to be parked inside the analysis call.
    timeout(Duration::from_secs(5), async {
        while analyst.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("analysis was never reached");

    engine.stop().await;
    analyst.release.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The late result must not have touched the store or the wire.
    assert!(engine.observer_snapshot().await.is_none());
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, DjEvent::AnalysisUpdate { .. }),
            "stale cycle published after stop"
        );
    }
    assert_eq!(voice.calls.load(Ordering::SeqCst), 0);
    assert!(player.plays.lock().await.is_empty());
}

#[tokio::test]
async fn voice_change_republishes_without_reanalyzing() {
    let analyst = ScriptedAnalyst::new(Vec::new(), report(6, 3, PlaybackCategory::Groove));
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst.clone(), voice.clone(), player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;
    let (_, first_phrase) = next_update(&mut rx).await;
    assert!(first_phrase.starts_with("hype"));

    engine.stop().await;
    // Drop anything the loop published before the stop landed.
    while rx.try_recv().is_ok() {}
    let analysis_calls = analyst.calls();

    engine.set_voice("smooth").await;
    assert_eq!(analyst.calls(), analysis_calls, "set_voice must not re-analyze");

    let (_, phrase) = next_update(&mut rx).await;
    assert!(phrase.starts_with("smooth"), "re-rendered line: {}", phrase);
    let (_, stored_line) = {
        let snapshot = engine.observer_snapshot().await.expect("state kept");
        match snapshot {
            DjEvent::AnalysisUpdate { report, phrase, .. } => (report, phrase),
            other => panic!("unexpected snapshot {:?}", other),
        }
    };
    assert!(stored_line.starts_with("smooth"));
}

#[tokio::test]
async fn observer_connect_sees_exactly_the_last_publish() {
    let analyst = ScriptedAnalyst::new(Vec::new(), report(8, 6, PlaybackCategory::Party));
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst, voice, player);

    assert!(engine.observer_snapshot().await.is_none());

    let mut rx = engine.events().subscribe();
    engine.start().await;
    let (_, phrase) = next_update(&mut rx).await;
    engine.stop().await;

    match engine.observer_snapshot().await.expect("a pair was published") {
        DjEvent::AnalysisUpdate {
            report: stored,
            phrase: stored_phrase,
            ..
        } => {
            assert_eq!(stored.energy_level, 8);
            assert_eq!(stored_phrase, phrase);
        }
        other => panic!("unexpected snapshot {:?}", other),
    }
}

#[tokio::test]
async fn empty_floor_pauses_exactly_once() {
    let empty = report(2, 0, PlaybackCategory::Chill);
    let analyst = ScriptedAnalyst::new(
        vec![Some(empty.clone()), Some(empty)],
        report(9, 4, PlaybackCategory::Party),
    );
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst, voice, player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;
    let _ = next_update(&mut rx).await;
    let _ = next_update(&mut rx).await;
    // People are back on the third cycle.
    let _ = next_update(&mut rx).await;
    engine.stop().await;

    assert_eq!(player.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(player.plays.lock().await.len(), 1);
}

#[tokio::test]
async fn forced_cadence_overrides_the_cooldown() {
    let config = DjConfig {
        force_every: 1,
        ..test_config()
    };
    // Categories alternate every cycle inside a huge cooldown window.
    let analyst = ScriptedAnalyst::new(
        vec![
            Some(report(9, 5, PlaybackCategory::Party)),
            Some(report(2, 5, PlaybackCategory::Chill)),
            Some(report(9, 5, PlaybackCategory::Party)),
        ],
        report(5, 5, PlaybackCategory::Groove),
    );
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(config, analyst, voice, player.clone());

    let mut rx = engine.events().subscribe();
    engine.start().await;
    for _ in 0..3 {
        let _ = next_update(&mut rx).await;
    }
    engine.stop().await;

    assert!(
        player.plays.lock().await.len() >= 3,
        "every forced category flip must fire"
    );
}

#[tokio::test]
async fn start_is_a_no_op_while_running() {
    let analyst = ScriptedAnalyst::new(Vec::new(), report(5, 3, PlaybackCategory::Groove));
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = engine_with(test_config(), analyst, voice, player);

    let mut rx = engine.events().subscribe();
    engine.start().await;
    engine.start().await;
    let _ = next_update(&mut rx).await;
    engine.stop().await;

    // The legitimate `started` was consumed while waiting for the first
    // update; a second one would still be sitting in the channel.
    let mut started = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, DjEvent::Started) {
            started += 1;
        }
    }
    assert_eq!(started, 0, "duplicate start must not emit a second event");
}

#[tokio::test]
async fn unreachable_camera_surfaces_an_error_and_stays_idle() {
    let analyst = ScriptedAnalyst::new(Vec::new(), report(5, 3, PlaybackCategory::Groove));
    let voice = Arc::new(EchoVoice::default());
    let player = Arc::new(RecordingPlayer::default());
    let engine = Arc::new(DjOrchestrator::new(
        test_config(),
        Arc::new(DeadCamera),
        analyst,
        voice,
        player,
        catalog(),
        EventBus::new(),
    ));

    let mut rx = engine.events().subscribe();
    engine.start().await;

    assert!(matches!(next_event(&mut rx).await, DjEvent::Error { .. }));
    assert!(!engine.is_running().await);
}
