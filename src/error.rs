// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Capture device / frame directory could not be opened.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Not enough keypoints to build a head/heart/tail triple.
    #[error("malformed input: expected {expected} keypoints, found {found}")]
    MalformedInput { expected: usize, found: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    /// Malformed or unrecognized client message.
    #[error("{0}")]
    Protocol(String),

    /// The peer went away. Normal end of a session, not a failure.
    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Per-frame conditions the collection loop skips instead of aborting on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MalformedInput { .. })
    }
}
