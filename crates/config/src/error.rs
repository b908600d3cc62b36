//! Configuration error types

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when parsing or validating a pipeline config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse JSON
    #[error("config '{name}' is not valid JSON: {source}")]
    ParseError {
        /// Config name
        name: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Validation error - required section missing or empty
    #[error("config '{name}' is missing required section '{section}'")]
    MissingSection {
        /// Config name
        name: String,
        /// Section name (e.g. "inputs", "flushers")
        section: &'static str,
    },

    /// Validation error - invalid value
    #[error("config '{name}' has invalid {field}: {message}")]
    InvalidValue {
        /// Config name
        name: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Validation error - route entry points past the flusher list
    #[error("config '{name}' route entry {entry} references flusher {index}, but only {count} flushers exist")]
    RouteIndexOutOfRange {
        /// Config name
        name: String,
        /// Route entry position
        entry: usize,
        /// Referenced flusher index
        index: usize,
        /// Number of configured flushers
        count: usize,
    },
}
