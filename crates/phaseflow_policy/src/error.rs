//! Error types for policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while building or loading policies.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid pattern for policy {policy}: {message}")]
    InvalidPattern { policy: String, message: String },

    #[error("Invalid policy configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
