use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding Error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Stub IO Error at {path}: {source}")]
    StubIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stub at {path} is corrupt: {reason}")]
    StubCorrupt { path: PathBuf, reason: String },

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Tracker Error: {0}")]
    Tracker(String),

    #[error("Invalid tracker selection `{0}`, expected 1 (ByteTrack), 2 (DeepSORT) or 3 (BoT-SORT)")]
    InvalidTrackerSelection(String),

    #[error("No frames to process")]
    NoFrames,

    #[error("Expected {expected} frames, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },

    #[error("Render Error: {0}")]
    Render(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
