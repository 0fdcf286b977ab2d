//! **SpotifyPlayer** — playback control over the Spotify Web API.
//!
//! The engine only drives the seam: play a selection, pause, ask whether
//! anything is audible. Catalog expansion (playlist -> track URIs) lives on
//! the concrete player because it is a startup concern, not a per-cycle one.

use crate::error::{DjError, DjResult};
use crate::pool::TrackSelection;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

#[async_trait]
pub trait PlaybackService: Send + Sync {
    /// Apply one selection to the active device.
    async fn play(&self, selection: &TrackSelection) -> DjResult<()>;

    /// Pause the active device.
    async fn pause(&self) -> DjResult<()>;

    /// Whether anything is currently audible.
    async fn is_playing(&self) -> DjResult<bool>;
}

#[derive(Deserialize)]
struct PlaybackState {
    #[serde(default)]
    is_playing: bool,
}

#[derive(Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<PlaylistTrack>,
}

#[derive(Deserialize)]
struct PlaylistTrack {
    uri: String,
}

pub struct SpotifyPlayer {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl SpotifyPlayer {
    pub fn new(token: impl Into<String>) -> DjResult<Self> {
        Self::with_base_url(SPOTIFY_API_BASE, token)
    }

    /// Point at a non-default API base (tests, proxies).
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> DjResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DjError::Playback(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
        })
    }

    /// The context URI for a playlist id.
    pub fn playlist_uri(playlist_id: &str) -> String {
        format!("spotify:playlist:{}", playlist_id)
    }

    /// Expand a playlist into its track URIs, following pagination. Returns
    /// an error (rather than an empty list) when the playlist cannot be
    /// read, so callers can degrade to context jumps.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> DjResult<Vec<String>> {
        let mut url = format!(
            "{}/playlists/{}/tracks?limit=100&fields=items.track.uri,next",
            self.base_url.trim_end_matches('/'),
            playlist_id
        );
        let mut uris = Vec::new();
        loop {
            let res = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| DjError::Playback(e.to_string()))?;
            if !res.status().is_success() {
                return Err(DjError::Playback(format!(
                    "playlist fetch error {}",
                    res.status()
                )));
            }
            let page: PlaylistPage = res
                .json()
                .await
                .map_err(|e| DjError::Playback(e.to_string()))?;
            uris.extend(page.items.into_iter().filter_map(|i| i.track.map(|t| t.uri)));
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(uris)
    }

    async fn put(&self, path: &str, body: Option<serde_json::Value>) -> DjResult<()> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut req = self.client.put(&url).bearer_auth(&self.token);
        req = match body {
            Some(body) => req.json(&body),
            // Spotify insists on a Content-Length even for empty PUT bodies.
            None => req.header("Content-Length", "0"),
        };
        let res = req
            .send()
            .await
            .map_err(|e| DjError::Playback(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DjError::Playback(format!(
                "player API error {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Request body for a play command.
pub(crate) fn play_body(selection: &TrackSelection) -> serde_json::Value {
    match selection {
        TrackSelection::Track(uri) => serde_json::json!({ "uris": [uri] }),
        TrackSelection::ContextJump { context, offset } => serde_json::json!({
            "context_uri": context,
            "offset": { "position": offset },
        }),
    }
}

#[async_trait]
impl PlaybackService for SpotifyPlayer {
    async fn play(&self, selection: &TrackSelection) -> DjResult<()> {
        self.put("/me/player/play", Some(play_body(selection))).await
    }

    async fn pause(&self) -> DjResult<()> {
        self.put("/me/player/pause", None).await
    }

    async fn is_playing(&self) -> DjResult<bool> {
        let url = format!("{}/me/player", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DjError::Playback(e.to_string()))?;
        // 204: no active device, nothing audible.
        if res.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(false);
        }
        if !res.status().is_success() {
            return Err(DjError::Playback(format!(
                "player state error {}",
                res.status()
            )));
        }
        let state: PlaybackState = res
            .json()
            .await
            .map_err(|e| DjError::Playback(e.to_string()))?;
        Ok(state.is_playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_uri_shape() {
        assert_eq!(
            SpotifyPlayer::playlist_uri("37i9dQZF1DX9C8KzGEUKV4"),
            "spotify:playlist:37i9dQZF1DX9C8KzGEUKV4"
        );
    }

    #[test]
    fn play_body_for_a_track() {
        let body = play_body(&TrackSelection::Track("spotify:track:abc".into()));
        assert_eq!(body["uris"][0], "spotify:track:abc");
    }

    #[test]
    fn play_body_for_a_context_jump() {
        let body = play_body(&TrackSelection::ContextJump {
            context: "spotify:playlist:xyz".into(),
            offset: 42,
        });
        assert_eq!(body["context_uri"], "spotify:playlist:xyz");
        assert_eq!(body["offset"]["position"], 42);
    }
}
