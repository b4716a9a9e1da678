//! # phaseflow_orchestrator
//!
//! Runs the SDLC phase agents in order and turns their results into one
//! orchestration outcome and a final report.
//!
//! # Architecture
//!
//! - **Orchestrator**: owns the five phase-agent runners and the run loop
//! - **Request**: feature request, phase range, constraints, environment
//! - **Strategies**: `with_fallback` pairs an optional LLM strategy with a
//!   heuristic for phase transitions, risk aggregation, and recommendations
//! - **Report**: Markdown final and early-stop reports under `orchestration/`
//!
//! # Example
//!
//! ```rust,ignore
//! use phaseflow_orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorRequest};
//!
//! let mut orchestrator = Orchestrator::from_config(OrchestratorConfig::default())?;
//! let outcome = orchestrator
//!     .run(OrchestratorRequest::new("Add dark mode toggle").with_phases("planning", "testing"))
//!     .await?;
//! println!("{}", outcome.status());
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod recommendations;
pub mod report;
pub mod request;
pub mod risks;
pub mod strategy;
pub mod transition;

pub use config::{OrchestratorConfig, OUTPUT_DIR_ENV};
pub use error::{OrchestratorError, OrchestratorResult, StrategyError};
pub use orchestrator::Orchestrator;
pub use outcome::{ExecutionLogEntry, OrchestrationOutcome};
pub use recommendations::{heuristic_recommendations, LlmRecommendationStrategy, MAX_RECOMMENDATIONS};
pub use request::{OrchestratorRequest, PhaseResults, RunPlan};
pub use risks::{flatten_risks, heuristic_risks, LlmRiskStrategy};
pub use strategy::{
    with_fallback, Decided, DecisionStrategy, HeuristicStrategy, OrchestrationMethod, WithFallback,
};
pub use transition::{heuristic_transition, LlmTransitionStrategy, TransitionInput, TransitionVerdict};
