//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
///
/// Agent failures never surface here; they are captured in an `AgentResult`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Invalid artifact name: {0}")]
    InvalidArtifactName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
