//! Run command - Orchestrate the SDLC phases for a feature request.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use phaseflow_llm::LlmAdapter;
use phaseflow_orchestrator::{
    OrchestrationOutcome, Orchestrator, OrchestratorConfig, OrchestratorRequest,
};

use super::RunStopped;

#[derive(Args)]
pub struct RunArgs {
    /// The feature request to orchestrate
    feature_request: String,

    /// Additional project context passed to every phase
    #[arg(long, default_value = "")]
    context: String,

    /// First phase to run
    #[arg(long, default_value = "planning")]
    start: String,

    /// Last phase to run
    #[arg(long, default_value = "deployment")]
    end: String,

    /// Phases to skip (repeatable)
    #[arg(long = "skip")]
    skip: Vec<String>,

    /// Deployment target environment
    #[arg(short, long, default_value = "staging")]
    environment: String,

    /// Forbid a capability, e.g. `--forbid kafka` sets no_kafka (repeatable)
    #[arg(long)]
    forbid: Vec<String>,

    /// Permit a capability forbidden by default, e.g. `--allow redis` (repeatable)
    #[arg(long)]
    allow: Vec<String>,

    /// YAML configuration file
    #[arg(short, long, env = "PHASEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Continue past review decisions without approval
    #[arg(long)]
    auto_proceed: bool,

    /// Use heuristics only, even when an API key is available
    #[arg(long)]
    no_llm: bool,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn load_config(&self) -> Result<OrchestratorConfig> {
        let config = match &self.config {
            Some(path) => OrchestratorConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => OrchestratorConfig::default(),
        };
        let mut config = config.with_env_overrides();

        if let Some(output) = &self.output {
            config = config.with_output_root(output);
        }
        if self.auto_proceed {
            config = config.with_auto_proceed(true);
        }
        if self.no_llm {
            config.llm.enabled = false;
        }
        Ok(config)
    }

    fn request(&self) -> OrchestratorRequest {
        let mut request = OrchestratorRequest::new(&self.feature_request)
            .with_project_context(&self.context)
            .with_phases(&self.start, &self.end)
            .with_environment(&self.environment);
        for phase in &self.skip {
            request = request.skipping(phase);
        }
        for capability in &self.forbid {
            request = request.with_constraint(format!("no_{}", capability), true);
        }
        for capability in &self.allow {
            request = request.with_constraint(format!("no_{}", capability), false);
        }
        request
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = args.load_config()?;
    let mut orchestrator = Orchestrator::from_config(config.clone())?;

    match LlmAdapter::from_config(&config.llm) {
        Ok(adapter) => {
            info!("LLM-assisted decisions via {} ({})", adapter.provider().as_str(), adapter.model());
            orchestrator = orchestrator.with_llm_client(Arc::new(adapter));
        }
        Err(e) => info!("Using heuristic decisions: {}", e),
    }

    let outcome = orchestrator.run(args.request()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    into_result(outcome)
}

fn print_outcome(outcome: &OrchestrationOutcome) {
    println!("Run {}: {}", outcome.run_id(), outcome.status());
    match outcome {
        OrchestrationOutcome::Completed {
            execution_log,
            all_artifacts,
            report_path,
            orchestration_method,
            recommendations,
            risks,
            ..
        } => {
            for entry in execution_log {
                println!(
                    "   {:<16} {:<8} {}",
                    entry.phase,
                    entry.status,
                    entry.decision.map_or("-", |d| d.as_str())
                );
            }
            println!("\nDecisions: {}", orchestration_method);
            println!("Risks: {}", risks.len());
            println!("Artifacts: {}", all_artifacts.len());
            println!("\nRecommendations:");
            for recommendation in recommendations {
                println!("   - {}", recommendation);
            }
            println!("\nReport: {}", report_path.display());
        }
        OrchestrationOutcome::EarlyStop {
            stopped_at_phase,
            reason,
            report_path,
            ..
        } => {
            println!("Stopped at {}: {}", stopped_at_phase, reason);
            println!("Report: {}", report_path.display());
        }
        OrchestrationOutcome::RequiresApproval {
            phase,
            recommendations,
            artifacts,
            next_steps,
            ..
        } => {
            println!("Phase {} needs review before continuing.", phase);
            for artifact in artifacts {
                println!("   artifact: {}", artifact.display());
            }
            for recommendation in recommendations {
                println!("   - {}", recommendation);
            }
            for step in next_steps {
                println!("   next: {}", step);
            }
            println!("Re-run with --auto-proceed to continue automatically.");
        }
        OrchestrationOutcome::Blocked { phase, errors, .. } => {
            match phase {
                Some(phase) => println!("Blocked at {}:", phase),
                None => println!("Request rejected:"),
            }
            for error in errors {
                println!("   - {}", error);
            }
        }
        OrchestrationOutcome::Failed { phase, errors, .. } => {
            println!("Phase {} failed:", phase);
            for error in errors {
                println!("   - {}", error);
            }
        }
    }
}

/// Turn a terminal outcome into the command result.
fn into_result(outcome: OrchestrationOutcome) -> Result<()> {
    let stopped = match outcome {
        OrchestrationOutcome::Completed { .. } => return Ok(()),
        OrchestrationOutcome::EarlyStop {
            stopped_at_phase,
            reason,
            ..
        } => RunStopped::EarlyStop {
            phase: stopped_at_phase.to_string(),
            reason,
        },
        OrchestrationOutcome::RequiresApproval { phase, .. } => {
            RunStopped::RequiresApproval(phase.to_string())
        }
        OrchestrationOutcome::Blocked { errors, .. } => RunStopped::Blocked(errors.join("; ")),
        OrchestrationOutcome::Failed { phase, errors, .. } => RunStopped::Failed {
            phase: phase.to_string(),
            errors: errors.join("; "),
        },
    };
    Err(stopped.into())
}
