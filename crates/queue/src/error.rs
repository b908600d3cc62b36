//! Queue error types
//!
//! Queue operations fail only by policy (watermark refusal, unknown key);
//! those outcomes are values, not errors. The error enum covers the few
//! genuinely fallible setup paths.

use thiserror::Error;

use crate::key::QueueKey;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors from queue construction and registry maintenance
#[derive(Debug, Error)]
pub enum QueueError {
    /// Watermark parameters violate `low < high <= capacity`
    #[error("invalid queue param: {reason}")]
    InvalidParam {
        /// What was wrong with the parameters
        reason: String,
    },

    /// Operation referenced a key with no live queue
    #[error("no queue registered under key {0}")]
    UnknownQueue(QueueKey),

    /// Exactly-once queue created without checkpoints
    #[error("exactly-once queue for key {0} requires at least one checkpoint")]
    NoCheckpoints(QueueKey),
}
