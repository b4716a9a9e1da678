//! # phaseflow_policy
//!
//! Guardrail policies applied to agent outputs after domain logic has run.
//!
//! This crate provides:
//! - **Policy**: a single named check over an output map
//! - **PolicyChain**: an explicit, enumerable list of policies
//! - **Built-in policies**: placeholder markers, traceability references,
//!   banned terms, and "code implies tests"
//! - **PolicyChainConfig**: YAML-loadable chain configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use phaseflow_policy::PolicyChain;
//! use serde_json::json;
//!
//! let chain = PolicyChain::documentation();
//! let output = json!({ "summary": "TODO: write this" });
//! let violations = chain.check(output.as_object().unwrap());
//! assert_eq!(violations.len(), 1);
//! ```

pub mod chain;
pub mod error;
pub mod policy;
pub mod rules;

pub use chain::{PolicyChain, PolicyChainConfig};
pub use error::{PolicyError, PolicyResult};
pub use policy::{collect_text, Policy, Violation};
pub use rules::{BannedTermsPolicy, NoPlaceholderPolicy, TestsPresentPolicy, TraceabilityPolicy};
