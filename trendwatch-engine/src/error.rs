//! Error types for the engine.
//!
//! Malformed samples, reordering and short forecasts are not errors: they
//! are absorbed by the monitor. These variants cover configuration calls
//! against the registry and persistence outputs.

use thiserror::Error;

/// Errors returned by registry operations and persistence outputs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No monitor is subscribed for this topic.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The monitor task for this topic has stopped.
    #[error("Monitor for topic {0} has shut down")]
    MonitorClosed(String),

    /// I/O failure while writing to an output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a record.
    #[error("Failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Http(err.to_string())
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
