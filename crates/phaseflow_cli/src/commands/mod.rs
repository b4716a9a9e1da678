//! CLI command definitions.
//!
//! Each subcommand maps to one entry point of the orchestrator.

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::ExitCodes;

pub mod phases;
pub mod run;

/// phaseflow - SDLC orchestration from feature request to deployment plan
#[derive(Parser)]
#[command(name = "phaseflow")]
#[command(version, about = "phaseflow - SDLC orchestration from feature request to deployment plan")]
#[command(long_about = r#"
phaseflow runs a feature request through the SDLC phases (planning,
feasibility, design, testing, deployment), writing Markdown artifacts for each
phase and a final report. Phase transitions, risk aggregation, and
recommendations use an LLM when OPENAI_API_KEY or ANTHROPIC_API_KEY is set,
and deterministic heuristics otherwise.

COMMANDS:
  run     → Orchestrate the phases for one feature request
  phases  → List phases, their agents, and prerequisites

EXIT CODES:
  0 - Completed
  1 - General error or failed phase
  2 - Invalid arguments or missing prerequisite
  3 - Blocked
  4 - Early stop (no-go)
  5 - Requires approval
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Orchestrate the SDLC phases for a feature request
    Run(run::RunArgs),

    /// List the SDLC phases
    Phases(phases::PhasesArgs),
}

/// A run that ended without completing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunStopped {
    #[error("run blocked: {0}")]
    Blocked(String),

    #[error("run stopped early at {phase}: {reason}")]
    EarlyStop { phase: String, reason: String },

    #[error("{0} requires approval before continuing")]
    RequiresApproval(String),

    #[error("phase {phase} failed: {errors}")]
    Failed { phase: String, errors: String },
}

impl RunStopped {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStopped::Blocked(_) => ExitCodes::BLOCKED,
            RunStopped::EarlyStop { .. } => ExitCodes::EARLY_STOP,
            RunStopped::RequiresApproval(_) => ExitCodes::REQUIRES_APPROVAL,
            RunStopped::Failed { .. } => ExitCodes::GENERAL_ERROR,
        }
    }
}
