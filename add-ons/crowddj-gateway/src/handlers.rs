//! Control-surface routes + the SSE observer stream.
//!
//! Thin layer: every handler parses, delegates to the engine, and frames
//! the reply. The SSE stream replays the last published pair to the
//! connecting observer before following the live broadcast.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crowddj_core::{ControlMode, DjEvent, DjOrchestrator};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

pub async fn start(State(engine): State<Arc<DjOrchestrator>>) -> Json<Value> {
    engine.start().await;
    Json(json!({ "status": "ok" }))
}

pub async fn stop(State(engine): State<Arc<DjOrchestrator>>) -> Json<Value> {
    engine.stop().await;
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct VoiceBody {
    voice: String,
}

pub async fn set_voice(
    State(engine): State<Arc<DjOrchestrator>>,
    Json(body): Json<VoiceBody>,
) -> Result<Json<Value>, ApiError> {
    let voice = body.voice.trim();
    if voice.is_empty() {
        return Err(bad_request("voice must not be empty"));
    }
    engine.set_voice(voice).await;
    Ok(Json(json!({ "status": "ok", "voice": voice })))
}

#[derive(Deserialize)]
pub struct ModeBody {
    mode: String,
}

pub async fn set_mode(
    State(engine): State<Arc<DjOrchestrator>>,
    Json(body): Json<ModeBody>,
) -> Result<Json<Value>, ApiError> {
    let Some(mode) = ControlMode::parse(&body.mode) else {
        return Err(bad_request("mode must be \"automatic\" or \"user_override\""));
    };
    engine.set_mode(mode).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn frame(
    State(engine): State<Arc<DjOrchestrator>>,
) -> Result<Json<Value>, ApiError> {
    match engine.current_frame().await {
        Ok(frame) => Ok(Json(json!({ "frame_base64": BASE64.encode(&frame.bytes) }))),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn status(State(engine): State<Arc<DjOrchestrator>>) -> Json<Value> {
    Json(json!({
        "phase": engine.phase().await,
        "has_report": engine.observer_snapshot().await.is_some(),
    }))
}

fn sse_event(event: &DjEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.name()).data(data)
}

pub async fn events(
    State(engine): State<Arc<DjOrchestrator>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe first so nothing published during the replay read is lost.
    let rx = engine.events().subscribe();
    let replay = engine.observer_snapshot().await;

    let replay = stream::iter(
        replay
            .into_iter()
            .map(|event| Ok::<_, Infallible>(sse_event(&event))),
    );
    let live = BroadcastStream::new(rx).filter_map(|result| async move {
        // A lagged receiver just skips ahead.
        result.ok().map(|event| Ok::<_, Infallible>(sse_event(&event)))
    });
    Sse::new(replay.chain(live)).keep_alive(KeepAlive::default())
}
