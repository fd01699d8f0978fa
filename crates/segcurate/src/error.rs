//! Error types for the segcurate library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for segcurate operations.
#[derive(Debug, Error)]
pub enum CurateError {
    /// Error reading or writing a file or directory.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Settings file could not be parsed.
    #[error("Settings error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid user-supplied configuration (directories, experiment selection).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation was called in a state that does not allow it.
    #[error("{0}")]
    Precondition(String),

    /// A loader wrote into a buffer that is no longer live.
    #[error("Image buffer generation {generation} is no longer live")]
    StaleBuffer { generation: u64 },

    /// An image could not be read by the loader.
    #[error("Failed to load image '{path}': {message}")]
    ImageLoad { path: PathBuf, message: String },

    /// The loader worker pool failed to start or stopped unexpectedly.
    #[error("Loader worker error: {0}")]
    Worker(String),

    /// A subscriber's handler failed during dispatch.
    #[error("Subscriber error: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CurateError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CurateError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any error raised inside an event handler.
    pub fn subscriber(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CurateError::Subscriber(err.into())
    }
}

/// Result type alias for segcurate operations.
pub type Result<T> = std::result::Result<T, CurateError>;
