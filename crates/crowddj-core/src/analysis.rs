//! **VisionAnalyst** — crowd analysis over an OpenAI-compatible vision API.
//!
//! Sends the frame as a base64 data URL to `/chat/completions` and parses
//! the model's JSON reply into a [`CrowdReport`]. Markdown code fences
//! around the JSON are tolerated; anything else malformed is `Unparseable`.

use crate::error::{DjError, DjResult};
use crate::frame::Frame;
use crate::types::{CrowdReport, PlaybackCategory};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;

const ANALYSIS_PROMPT: &str = "You are an expert crowd analyst. Look at this \
party snapshot and rate the energy of the room. Reply with JSON only, using \
exactly this shape: {\"has_people\": boolean, \"people_count\": integer, \
\"description\": string, \"energy_level\": integer (1-10), \"dancing\": \
boolean, \"bored\": boolean, \"recommended_category\": \"chill\" | \
\"groove\" | \"party\"}. No introductions, no explanations, only the JSON.";

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, frame: &Frame) -> DjResult<CrowdReport>;
}

// Wire shape of the model's reply; normalized into CrowdReport below.
#[derive(Deserialize)]
struct WireReport {
    #[serde(default)]
    has_people: bool,
    #[serde(default)]
    people_count: u32,
    #[serde(default)]
    description: String,
    #[serde(default = "default_wire_energy")]
    energy_level: i64,
    #[serde(default)]
    dancing: bool,
    #[serde(default)]
    bored: bool,
    #[serde(default)]
    recommended_category: Option<String>,
}

fn default_wire_energy() -> i64 {
    5
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Production analysis backend over an OpenAI-compatible vision endpoint.
pub struct VisionAnalyst {
    base_url: String,
    api_key: String,
    model: String,
    default_category: PlaybackCategory,
    client: reqwest::Client,
}

impl VisionAnalyst {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        default_category: PlaybackCategory,
    ) -> DjResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DjError::Analysis(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_category,
            client,
        })
    }
}

#[async_trait]
impl AnalysisService for VisionAnalyst {
    async fn analyze(&self, frame: &Frame) -> DjResult<CrowdReport> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&frame.bytes));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": ANALYSIS_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "temperature": 0.2,
            "max_tokens": 512,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DjError::Analysis(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DjError::Analysis(format!(
                "vision API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| DjError::Analysis(e.to_string()))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        parse_report(content, self.default_category)
    }
}

/// Parse + normalize a model reply into a report. Pub(crate) so the wire
/// handling is testable without an HTTP server.
pub(crate) fn parse_report(
    content: &str,
    default_category: PlaybackCategory,
) -> DjResult<CrowdReport> {
    let cleaned = strip_code_fences(content);
    let wire: WireReport = serde_json::from_str(cleaned)
        .map_err(|e| DjError::Unparseable(format!("{} in {:?}", e, cleaned)))?;

    let mut report = CrowdReport {
        has_people: wire.has_people,
        people_count: wire.people_count,
        description: wire.description,
        energy_level: wire.energy_level.clamp(1, 10) as u8,
        dancing: wire.dancing,
        bored: wire.bored,
        recommended_category: wire
            .recommended_category
            .as_deref()
            .map(|label| PlaybackCategory::parse_or(label, default_category))
            .unwrap_or(default_category),
    };
    report.clamp();
    Ok(report)
}

fn strip_code_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_fenced_reply() {
        let content = "```json\n{\"has_people\": true, \"people_count\": 12, \
                       \"description\": \"crowded\", \"energy_level\": 8, \
                       \"dancing\": true, \"bored\": false, \
                       \"recommended_category\": \"party\"}\n```";
        let report = parse_report(content, PlaybackCategory::Chill).unwrap();
        assert!(report.has_people);
        assert_eq!(report.people_count, 12);
        assert_eq!(report.energy_level, 8);
        assert_eq!(report.recommended_category, PlaybackCategory::Party);
    }

    #[test]
    fn clamps_out_of_range_energy() {
        let report =
            parse_report("{\"energy_level\": 42}", PlaybackCategory::Chill).unwrap();
        assert_eq!(report.energy_level, 10);
        let report =
            parse_report("{\"energy_level\": -3}", PlaybackCategory::Chill).unwrap();
        assert_eq!(report.energy_level, 1);
    }

    #[test]
    fn unknown_category_resolves_to_default() {
        let content = "{\"recommended_category\": \"vaporwave\"}";
        let report = parse_report(content, PlaybackCategory::Groove).unwrap();
        assert_eq!(report.recommended_category, PlaybackCategory::Groove);
    }

    #[test]
    fn missing_category_resolves_to_default() {
        let report = parse_report("{}", PlaybackCategory::Chill).unwrap();
        assert_eq!(report.recommended_category, PlaybackCategory::Chill);
        assert_eq!(report.energy_level, 5);
    }

    #[test]
    fn prose_reply_is_unparseable() {
        let err = parse_report("the room looks lively!", PlaybackCategory::Chill)
            .unwrap_err();
        assert!(matches!(err, DjError::Unparseable(_)));
    }
}
