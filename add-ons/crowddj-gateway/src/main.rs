//! crowddj Gateway: HTTP/SSE entry point over the DJ engine.
//!
//! Commands mutate the engine, observers follow the SSE stream. All
//! configuration comes from `.env` / the process environment; missing
//! credentials abort startup before the first cycle can run.

mod handlers;

use axum::routing::{get, post};
use axum::Router;
use crowddj_core::{
    DjConfig, DjOrchestrator, EventBus, HttpFrameSource, LlmVoice, ServiceConfig, SpotifyPlayer,
    TrackPool, VisionAnalyst,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[crowddj-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tunables = DjConfig::from_env();
    let services = match ServiceConfig::from_env() {
        Ok(services) => services,
        Err(e) => {
            eprintln!("[crowddj-gateway] {}", e);
            std::process::exit(1);
        }
    };

    let frames = HttpFrameSource::new(&services.frame_url).expect("build frame source");
    let analyst = VisionAnalyst::new(
        &services.llm_api_url,
        &services.llm_api_key,
        &services.vision_model,
        tunables.default_category,
    )
    .expect("build vision analyst");
    let voice = LlmVoice::new(
        &services.llm_api_url,
        &services.llm_api_key,
        &services.phrase_model,
        &services.tts_model,
    )
    .expect("build voice backend");
    let player = SpotifyPlayer::new(&services.spotify_token).expect("build player");

    // Expand the playlist into the energy pools up front; degrade to random
    // jumps inside the playlist when it cannot be read.
    let pool = match player.playlist_tracks(&services.playlist_id).await {
        Ok(tracks) if !tracks.is_empty() => {
            info!(count = tracks.len(), "playlist catalog loaded");
            TrackPool::from_catalog(tracks)
        }
        Ok(_) => {
            warn!("playlist is empty, falling back to context jumps");
            TrackPool::context_fallback(SpotifyPlayer::playlist_uri(&services.playlist_id))
        }
        Err(e) => {
            warn!("playlist fetch failed ({}), falling back to context jumps", e);
            TrackPool::context_fallback(SpotifyPlayer::playlist_uri(&services.playlist_id))
        }
    };

    let engine = Arc::new(DjOrchestrator::new(
        tunables,
        Arc::new(frames),
        Arc::new(analyst),
        Arc::new(voice),
        Arc::new(player),
        pool,
        EventBus::new(),
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = Router::new()
        .route("/api/v1/dj/start", post(handlers::start))
        .route("/api/v1/dj/stop", post(handlers::stop))
        .route("/api/v1/dj/voice", post(handlers::set_voice))
        .route("/api/v1/dj/mode", post(handlers::set_mode))
        .route("/api/v1/dj/frame", get(handlers::frame))
        .route("/api/v1/dj/status", get(handlers::status))
        .route("/api/v1/dj/events", get(handlers::events))
        .layer(cors)
        .with_state(Arc::clone(&engine));

    let listener = tokio::net::TcpListener::bind(&services.bind_addr)
        .await
        .expect("bind gateway address");
    info!(addr = %services.bind_addr, "crowddj gateway listening");

    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("CTRL-C received; shutting down gateway");
            shutdown_engine.stop().await;
        })
        .await
        .expect("serve gateway");
}
