//! Error types for the crowddj engine

use thiserror::Error;

/// Result type alias for engine operations
pub type DjResult<T> = Result<T, DjError>;

/// Errors that can occur while driving the analysis-act cycle
#[derive(Error, Debug)]
pub enum DjError {
    #[error("Frame capture error: {0}")]
    Capture(String),

    #[error("Analysis backend error: {0}")]
    Analysis(String),

    #[error("Analysis returned malformed data: {0}")]
    Unparseable(String),

    #[error("Voice rendering error: {0}")]
    Voice(String),

    #[error("Playback control error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
