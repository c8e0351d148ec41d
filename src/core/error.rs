use thiserror::Error;

/// Failures surfaced by the scene manager and its rendering backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("failed to fetch panorama {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to decode panorama image: {0}")]
    Decode(String),
    #[error("invalid hotspot record: {0}")]
    InvalidRecord(String),
    #[error("rendering context lost")]
    ContextLost,
    #[error("gpu error: {0}")]
    Gpu(String),
    #[error("fullscreen unavailable: {0}")]
    Fullscreen(String),
    #[error("scene manager has been destroyed")]
    Destroyed,
}

/// Failures surfaced by the audio bus manager and its backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("audio graph unavailable: {0}")]
    GraphUnavailable(String),
    #[error("failed to load audio {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("playback failed: {0}")]
    Play(String),
    #[error("routing failed: {0}")]
    Routing(String),
    #[error("audio context resume failed: {0}")]
    Resume(String),
    #[error("audio bus has been destroyed")]
    Destroyed,
}
