//! **LlmVoice** — DJ line generation + TTS rendering.
//!
//! Two hops against the same OpenAI-compatible API: `/chat/completions`
//! writes the one-liner from the crowd report, `/audio/speech` renders it
//! in the selected character's voice. TTS failure degrades to a text-only
//! line; only a line that cannot be produced at all falls back to the
//! canned one, so the floor is never left without an announcement.

use crate::error::{DjError, DjResult};
use crate::types::{CrowdReport, DjLine};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const LINE_PROMPT: &str = "You are the house MC of a party: charismatic, a \
little over the top, and determined that nobody gets bored. You received a \
JSON report of the floor below. Produce ONE short, punchy line to hype the \
crowd. Low energy (1-4): challenge them to move. Mid (5-7): push them to \
turn it up. High (8-10) and dancing: celebrate with them. Nobody visible: \
crack a joke about a ghost party. Bored faces: call them out playfully. \
Reply with only the line, no introductions, no quotes.";

/// Used when the line model is unreachable; the show must go on.
pub const FALLBACK_LINE: &str =
    "My wires got crossed for a second -- but the party keeps going!";

/// Map a DJ character id to the TTS voice it speaks with. Unknown
/// characters get the house default.
pub fn character_voice(character: &str) -> &'static str {
    let c = character.trim();
    if c.eq_ignore_ascii_case("hype") {
        "onyx"
    } else if c.eq_ignore_ascii_case("smooth") {
        "shimmer"
    } else if c.eq_ignore_ascii_case("radio") {
        "echo"
    } else if c.eq_ignore_ascii_case("chill") {
        "alloy"
    } else if c.eq_ignore_ascii_case("diva") {
        "nova"
    } else {
        "onyx"
    }
}

#[async_trait]
pub trait VoiceService: Send + Sync {
    /// Render one line for the report under the given character. Must fall
    /// back to a text-only line when audio rendering fails; errors only when
    /// no line can be produced at all.
    async fn render(&self, report: &CrowdReport, character: &str) -> DjResult<DjLine>;
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

/// Production voice backend: line via chat completions, audio via
/// `/audio/speech`.
pub struct LlmVoice {
    base_url: String,
    api_key: String,
    phrase_model: String,
    tts_model: String,
    client: reqwest::Client,
}

impl LlmVoice {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        phrase_model: impl Into<String>,
        tts_model: impl Into<String>,
    ) -> DjResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DjError::Voice(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            phrase_model: phrase_model.into(),
            tts_model: tts_model.into(),
            client,
        })
    }

    async fn phrase(&self, report: &CrowdReport) -> DjResult<String> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let report_json = serde_json::to_string_pretty(report)
            .map_err(|e| DjError::Voice(e.to_string()))?;
        let body = serde_json::json!({
            "model": self.phrase_model,
            "messages": [
                { "role": "system", "content": LINE_PROMPT },
                { "role": "user", "content": format!("Floor report:\n{}", report_json) }
            ],
            "temperature": 0.9,
            "max_tokens": 96,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DjError::Voice(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DjError::Voice(format!(
                "line API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| DjError::Voice(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default())
    }

    async fn synthesize(&self, text: &str, voice: &str) -> DjResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.tts_model,
            "input": text,
            "voice": voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DjError::Voice(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DjError::Voice(format!(
                "TTS API error {}: {}",
                status, body
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| DjError::Voice(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl VoiceService for LlmVoice {
    async fn render(&self, report: &CrowdReport, character: &str) -> DjResult<DjLine> {
        let text = match self.phrase(report).await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => FALLBACK_LINE.to_string(),
            Err(e) => {
                warn!("DJ line generation failed: {}", e);
                FALLBACK_LINE.to_string()
            }
        };
        let audio = match self.synthesize(&text, character_voice(character)).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                warn!("TTS failed, publishing text-only line: {}", e);
                None
            }
        };
        Ok(DjLine { text, audio })
    }
}

/// Placeholder voice: echoes a deterministic text-only line. Use for demos
/// and wiring tests without an API key.
#[derive(Debug, Default)]
pub struct PlaceholderVoice;

#[async_trait]
impl VoiceService for PlaceholderVoice {
    async fn render(&self, report: &CrowdReport, character: &str) -> DjResult<DjLine> {
        Ok(DjLine::text_only(format!(
            "[{}] energy {}, {} on the floor",
            character, report.energy_level, report.people_count
        )))
    }
}
