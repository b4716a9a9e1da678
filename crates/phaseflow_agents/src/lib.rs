//! # phaseflow_agents
//!
//! Deterministic SDLC phase agents.
//!
//! Each agent implements [`phaseflow_core::SdlcAgent`]: it validates the
//! context it needs, produces Markdown artifacts under its phase directory,
//! and publishes an `SdlcPhaseResult` under `phase_result`.
//!
//! # Phases
//!
//! - **Planner** (`planning`): feature request to a sized issue
//! - **Feasibility** (`feasibility`): constraint checks, risks, effort, go / no-go
//! - **Design** (`design`): HLD, LLD, ADRs, and diagrams
//! - **Testing** (`testing`): test cases and the test pyramid
//! - **Deployment** (`deployment`): rollout, rollback, and monitoring plans
//!
//! # Example
//!
//! ```rust,ignore
//! use phaseflow_agents::PlannerAgent;
//! use phaseflow_core::{AgentRunner, AgentServices, ArtifactStore};
//!
//! let mut runner = AgentRunner::new(
//!     PlannerAgent::new(ArtifactStore::new("docs/sdlc_outputs")),
//!     AgentServices::default(),
//! );
//! let result = runner.execute(&input).await;
//! ```

pub mod constraints;
pub mod deployment;
pub mod design;
pub mod feasibility;
pub mod issue;
pub mod planner;
pub mod testing;

pub use constraints::{ConstraintViolation, TechnicalConstraints};
pub use deployment::{DeploymentAgent, DEFAULT_ENVIRONMENT};
pub use design::{Adr, Component, DesignAgent};
pub use feasibility::{EffortAnalysis, FeasibilityAgent, TechnicalFeasibility};
pub use issue::{Issue, Priority};
pub use planner::PlannerAgent;
pub use testing::{LevelShare, TestCase, TestLevel, TestPyramid, TestingAgent};
