//! **EventBus** — broadcast fan-out from the engine to observer transports.
//!
//! The engine publishes [`DjEvent`]s; transports (the SSE gateway) subscribe
//! and frame them however they like. Publishing never blocks and never fails
//! a cycle: with no observers connected the event is simply dropped.

use crate::types::{CrowdReport, DjLine};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events observers can receive, serialized as tagged JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DjEvent {
    /// The cycle loop started.
    Started,
    /// The cycle loop stopped.
    Stopped,
    /// A completed cycle's report + line, or a re-rendered line for the
    /// stored report after a voice change.
    AnalysisUpdate {
        report: CrowdReport,
        phrase: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_base64: Option<String>,
        at: DateTime<Utc>,
    },
    /// A per-cycle or startup failure worth surfacing to observers.
    Error { message: String },
}

impl DjEvent {
    /// Build an `analysis_update`, encoding any rendered audio for transport.
    pub fn analysis_update(report: &CrowdReport, line: &DjLine) -> Self {
        Self::AnalysisUpdate {
            report: report.clone(),
            phrase: line.text.clone(),
            audio_base64: line.audio.as_deref().map(|bytes| BASE64.encode(bytes)),
            at: Utc::now(),
        }
    }

    /// Stable event name, used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::AnalysisUpdate { .. } => "analysis_update",
            Self::Error { .. } => "error",
        }
    }
}

const EVENT_CAPACITY: usize = 64;

/// Fan-out channel between the engine and any number of observers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DjEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish to all current subscribers. A send error only means nobody is
    /// listening right now.
    pub fn publish(&self, event: DjEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DjEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaybackCategory;

    fn report() -> CrowdReport {
        CrowdReport {
            has_people: true,
            people_count: 4,
            description: "small group near the bar".to_string(),
            energy_level: 6,
            dancing: false,
            bored: false,
            recommended_category: PlaybackCategory::Groove,
        }
    }

    #[test]
    fn analysis_update_encodes_audio() {
        let line = DjLine {
            text: "turn it up!".to_string(),
            audio: Some(vec![1, 2, 3]),
        };
        let event = DjEvent::analysis_update(&report(), &line);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "analysis_update");
        assert_eq!(json["data"]["phrase"], "turn it up!");
        assert_eq!(json["data"]["audio_base64"], BASE64.encode([1u8, 2, 3]));
    }

    #[test]
    fn text_only_line_omits_audio_field() {
        let event = DjEvent::analysis_update(&report(), &DjLine::text_only("hello floor"));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"].get("audio_base64").is_none());
    }

    #[test]
    fn unit_events_serialize_with_name_only() {
        let json = serde_json::to_value(DjEvent::Started).unwrap();
        assert_eq!(json["event"], "started");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.publish(DjEvent::Started);
        let mut rx = bus.subscribe();
        bus.publish(DjEvent::Stopped);
        assert!(matches!(rx.recv().await.unwrap(), DjEvent::Stopped));
    }
}
