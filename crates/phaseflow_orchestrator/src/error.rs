//! Error types for orchestration.

use thiserror::Error;

use phaseflow_core::{CoreError, Phase};
use phaseflow_llm::LlmError;
use phaseflow_policy::PolicyError;

/// Orchestration errors.
///
/// Business outcomes (blocked, early stop, approval) are never errors; these
/// are usage and environment problems only.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Phase {phase} requires a {requires} result, which is missing")]
    MissingPrerequisite { phase: Phase, requires: Phase },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Why a primary decision strategy produced no usable value.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Response rejected: {0}")]
    Rejected(String),
}

/// Result type for orchestration operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
