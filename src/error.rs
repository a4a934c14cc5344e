use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("landmark detection failed: {0}")]
    Detection(String),

    #[error("degenerate geometry: {0}")]
    Geometry(String),

    #[error("failed to read or write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} image is empty")]
    EmptyImage(&'static str),

    #[error("unsupported image layout: {0}")]
    UnsupportedImage(String),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid pipeline state: {0}")]
    State(String),
}

impl AlignError {
    /// Detection and geometry failures degrade to an unaligned passthrough.
    /// Everything else is a hard failure for the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AlignError::Detection(_) | AlignError::Geometry(_))
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
