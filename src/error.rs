// src/error.rs
use thiserror::Error;

/// Boxed error returned by an [`Encoder`](crate::encoder::Encoder) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, GlanceError>;

#[derive(Error, Debug)]
pub enum GlanceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("encoder failed on patch {index}: {source}")]
    EncoderFailure {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("shape mismatch at patch {index}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("image {image}: {source}")]
    ImageFailure {
        image: usize,
        #[source]
        source: Box<GlanceError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("checkpoint mismatch: {0}")]
    Checkpoint(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("dataset error: {0}")]
    Dataset(String),
}

impl GlanceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        GlanceError::InvalidArgument(msg.into())
    }
}
