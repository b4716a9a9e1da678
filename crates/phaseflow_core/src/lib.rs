//! # phaseflow_core
//!
//! Core execution model for phaseflow.
//!
//! This crate provides the agent execution protocol, sequential pipelines,
//! and the SDLC phase model that the orchestrator builds on.
//!
//! # Architecture
//!
//! - **Agents**: Units of work with validation, domain logic, and guardrails
//! - **Runners**: Wrap an agent with lifecycle status and injected services
//! - **Pipelines**: Run agents in order, merging each output into a shared context
//! - **SDLC pipelines**: Pipelines that also stop on business decisions
//! - **Phase results**: The standardized decision record every phase publishes
//!
//! # Example
//!
//! ```rust,ignore
//! use phaseflow_core::{AgentRunner, AgentServices, Payload, Pipeline, PipelineOutcome};
//!
//! let services = AgentServices::default();
//! let mut pipeline = Pipeline::new("intake")
//!     .agent(AgentRunner::new(ParseAgent, services.clone()))
//!     .agent(AgentRunner::new(EnrichAgent, services));
//!
//! match pipeline.execute(Payload::new()).await {
//!     PipelineOutcome::Success { data, .. } => println!("{:?}", data),
//!     other => eprintln!("pipeline stopped: {}", other.status()),
//! }
//! ```

pub mod agent;
pub mod error;
pub mod phase;
pub mod pipeline;
pub mod sdlc;
pub mod services;

// Re-export main types for convenience
pub use agent::{Agent, AgentResult, AgentRunner, AgentStatus, Payload};
pub use error::{CoreError, CoreResult};
pub use phase::{Decision, Likelihood, Phase, Risk, SdlcPhaseResult, Severity, PHASE_RESULT_KEY};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use sdlc::{ArtifactStore, SdlcAgent, SdlcOutcome, SdlcPipeline, DEFAULT_OUTPUT_ROOT};
pub use services::{AgentServices, ExecutionMetrics, MetricsSnapshot};
