//! # phaseflow_llm
//!
//! Narrow LLM access for decision strategies: submit a prompt, get text back,
//! and parse a structured JSON object out of it.
//!
//! Supports OpenAI and Anthropic, selected via environment variables.
//! The adapter makes exactly one request per call; callers that want a
//! different answer on failure fall back to their own heuristics.

pub mod client;
pub mod error;
pub mod parse;

pub use client::{LlmAdapter, LlmClient, LlmConfig, LlmProvider};
pub use error::{LlmError, LlmResult};
pub use parse::{complete_structured, extract_json_object, parse_structured};
