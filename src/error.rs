use std::time::Duration;

use thiserror::Error;

/// Rejected collection input, raised before any unit starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error("scroll limit must be non-negative, got {0}")]
    NegativeScrollLimit(i64),
    #[error("query at position {index} is blank")]
    BlankQuery { index: usize },
    #[error("max_concurrent_units must be at least 1")]
    ZeroConcurrency,
    #[error("stagnation threshold must be at least 1")]
    ZeroStagnationThreshold,
}

/// Session-level failure of a content source.
///
/// Anything raised here ends the owning unit only.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("navigation to '{target}' failed: {reason}")]
    Navigation { target: String, reason: String },
    #[error("navigation did not complete within {0:?}")]
    NavigationTimeout(Duration),
    #[error("initial content did not appear within {0:?}")]
    InitialContentTimeout(Duration),
    #[error("session error: {0}")]
    Session(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed feed payload: {0}")]
    Malformed(String),
    #[error("unit panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

/// Failure to read one field of one visible item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field '{0}' is missing")]
    Missing(&'static str),
    #[error("field '{field}' is malformed: {details}")]
    Malformed { field: &'static str, details: String },
}
