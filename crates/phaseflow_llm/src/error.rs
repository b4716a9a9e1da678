//! Error types for LLM access.

use thiserror::Error;

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors raised while calling a provider or reading its response.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Malformed structured response: {0}")]
    Malformed(String),
}
