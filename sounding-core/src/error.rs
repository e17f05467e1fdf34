//! Error types for Sounding core.

use std::{error::Error, fmt, io};

/// Error type for Sounding core operations.
///
/// Only run-level failures surface here. Per-file problems are recorded as
/// [`crate::Issue`] values inside the report instead.
#[derive(Debug)]
pub enum SoundingError {
    /// An underlying I/O error.
    Io(io::Error),
    /// A JSON (de)serialization error.
    Json(serde_json::Error),
    /// The configuration is invalid; the run is aborted before it starts.
    Config(String),
    /// The classifier produced no files to analyze.
    NoInput,
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for SoundingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Config(message) => write!(f, "configuration error: {message}"),
            Self::NoInput => write!(f, "no files found to analyze"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for SoundingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SoundingError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SoundingError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience result type for Sounding core.
pub type Result<T> = std::result::Result<T, SoundingError>;
