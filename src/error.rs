//! Error types for stream delivery.

use thiserror::Error;

/// Main error type for stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid streamable: {0}")]
    InvalidStreamable(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Scheduler is stopped")]
    SchedulerStopped,

    #[error("Backend is closed")]
    Closed,
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            StreamError::Deserialization(e.to_string())
        } else {
            StreamError::Serialization(e.to_string())
        }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
