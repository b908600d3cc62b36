//! Pipeline error types
//!
//! Initialization errors abort the affected pipeline only; runtime errors
//! surface as structured log records and metric increments, never as
//! global fatals.

use thiserror::Error;

use conduit_queue::QueueKey;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected at init; fatal for this pipeline
    #[error("invalid config for '{pipeline}': {message}")]
    ConfigInvalid {
        /// Pipeline name
        pipeline: String,
        /// What was rejected
        message: String,
    },

    /// Transient shortage; the caller retries
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Admission refused by a full queue; non-fatal
    #[error("queue full: {0}")]
    QueueFull(QueueKey),

    /// Routed to a key with no queue; logged and dropped
    #[error("queue not found: {0}")]
    QueueNotFound(QueueKey),

    /// Flusher delivery failed; retried by the flusher with backoff
    #[error("flusher '{flusher}' send failed")]
    FlusherSendFailed {
        /// Flusher plugin name
        flusher: String,
    },

    /// Programmer error; logged, process continues
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn config(pipeline: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            pipeline: pipeline.into(),
            message: message.into(),
        }
    }
}
