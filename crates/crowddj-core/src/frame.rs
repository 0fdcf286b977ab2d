//! Frame acquisition seam.
//!
//! The engine owns the source exclusively while running: `open` on start,
//! `grab` once per cycle (plus observer-requested previews), `close` on
//! stop. Production grabs JPEG stills from an IP camera's snapshot
//! endpoint; tests and demos plug in canned sources.

use crate::error::{DjError, DjResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One captured camera frame (encoded image bytes, typically JPEG).
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Claim the camera. Fails when the device is unreachable.
    async fn open(&self) -> DjResult<()>;

    /// Grab one frame. Only valid between `open` and `close`.
    async fn grab(&self) -> DjResult<Frame>;

    /// Release the camera. Idempotent.
    async fn close(&self);
}

/// Snapshot-endpoint camera: every `grab` is one GET returning a JPEG.
pub struct HttpFrameSource {
    url: String,
    client: reqwest::Client,
    open: AtomicBool,
}

impl HttpFrameSource {
    pub fn new(url: impl Into<String>) -> DjResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DjError::Capture(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            open: AtomicBool::new(false),
        })
    }

    async fn fetch(&self) -> DjResult<Frame> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DjError::Capture(e.to_string()))?;
        if !res.status().is_success() {
            return Err(DjError::Capture(format!(
                "camera endpoint returned {}",
                res.status()
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| DjError::Capture(e.to_string()))?;
        Ok(Frame {
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn open(&self) -> DjResult<()> {
        // A probe grab proves the camera is reachable before the loop starts.
        self.fetch().await?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn grab(&self) -> DjResult<Frame> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DjError::Capture("frame source is not open".to_string()));
        }
        self.fetch().await
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Canned source that serves one in-memory frame forever. Useful for demos
/// and for exercising the loop without a camera.
pub struct StaticFrameSource {
    frame: Frame,
    open: AtomicBool,
}

impl StaticFrameSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            frame: Frame { bytes },
            open: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn open(&self) -> DjResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn grab(&self) -> DjResult<Frame> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DjError::Capture("frame source is not open".to_string()));
        }
        Ok(self.frame.clone())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_enforces_open_before_grab() {
        let source = StaticFrameSource::new(vec![0xFF, 0xD8]);
        assert!(source.grab().await.is_err());

        source.open().await.unwrap();
        assert_eq!(source.grab().await.unwrap().bytes, vec![0xFF, 0xD8]);

        source.close().await;
        assert!(source.grab().await.is_err());
    }
}
