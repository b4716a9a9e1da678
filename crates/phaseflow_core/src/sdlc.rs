//! SDLC specializations: phase-aware agents, artifact persistence, and
//! decision-aware pipelines.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentResult, AgentRunner, AgentStatus, Payload};
use crate::error::{CoreError, CoreResult};
use crate::phase::{Decision, Phase, Risk, SdlcPhaseResult};
use crate::pipeline::{Drive, Pipeline};
use crate::services::AgentServices;

/// Default root directory for phase artifacts.
pub const DEFAULT_OUTPUT_ROOT: &str = "docs/sdlc_outputs";

/// Writes artifacts under `{root}/{scope}/{filename}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` to `{root}/{scope}/{filename}` and return the path.
    ///
    /// Parent directories are created as needed; an existing file is overwritten.
    pub fn save(&self, scope: &str, filename: &str, content: &str) -> CoreResult<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(CoreError::InvalidArtifactName(filename.to_string()));
        }

        let dir = self.root.join(scope);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        std::fs::write(&path, content)?;
        debug!("Saved artifact to {:?}", path);
        Ok(path)
    }

    /// `{kind}_{YYYYmmdd_HHMMSS}.md`
    pub fn timestamped_name(kind: &str) -> String {
        format!("{}_{}.md", kind, Utc::now().format("%Y%m%d_%H%M%S"))
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_ROOT)
    }
}

/// An agent bound to one SDLC phase.
///
/// SDLC agents publish an [`SdlcPhaseResult`] under `phase_result` in their
/// output and persist their documents through an [`ArtifactStore`].
pub trait SdlcAgent: Agent {
    fn phase(&self) -> Phase;

    fn artifact_store(&self) -> &ArtifactStore;

    /// Persist an artifact under this agent's phase directory.
    fn save_artifact(&self, content: &str, filename: &str) -> CoreResult<PathBuf> {
        self.artifact_store()
            .save(self.phase().as_str(), filename, content)
    }

    /// Start a phase result for this agent's phase.
    fn phase_result(&self, decision: Decision, confidence: f64) -> SdlcPhaseResult {
        SdlcPhaseResult::new(self.phase(), decision, confidence)
    }
}

/// Terminal state of an SDLC pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SdlcOutcome {
    Success {
        data: Payload,
        results: Vec<AgentResult>,
        phases_completed: Vec<Phase>,
    },
    Failed {
        failed_phase: Phase,
        failed_agent: String,
        errors: Vec<String>,
        completed_phases: Vec<Phase>,
    },
    Blocked {
        blocked_phase: Phase,
        blocked_agent: String,
        errors: Vec<String>,
        completed_phases: Vec<Phase>,
    },
    Stopped {
        stopped_phase: Phase,
        reason: Vec<String>,
        risks: Vec<Risk>,
        completed_phases: Vec<Phase>,
    },
    RequiresApproval {
        phase: Phase,
        recommendations: Vec<String>,
        artifacts: Vec<PathBuf>,
        next_steps: Vec<String>,
        completed_phases: Vec<Phase>,
    },
}

impl SdlcOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SdlcOutcome::Success { .. } => "success",
            SdlcOutcome::Failed { .. } => "failed",
            SdlcOutcome::Blocked { .. } => "blocked",
            SdlcOutcome::Stopped { .. } => "stopped",
            SdlcOutcome::RequiresApproval { .. } => "requires_approval",
        }
    }
}

enum Gate {
    Stop(SdlcPhaseResult),
    Approve(SdlcPhaseResult),
}

/// A pipeline of SDLC agents that also honors business decisions.
///
/// Protocol status is checked first: a `Failed` or `Blocked` agent ends the
/// run regardless of any decision in its output. A successful agent whose
/// phase result says `no-go` (or `blocked`) stops the run; `review` stops it
/// for approval unless `auto_proceed` is set.
#[derive(Debug)]
pub struct SdlcPipeline {
    pipeline: Pipeline,
    phases: Vec<Phase>,
    auto_proceed: bool,
}

impl SdlcPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(name),
            phases: Vec::new(),
            auto_proceed: false,
        }
    }

    pub fn auto_proceed(mut self, auto_proceed: bool) -> Self {
        self.auto_proceed = auto_proceed;
        self
    }

    /// Add a phase agent.
    pub fn stage(mut self, agent: impl SdlcAgent + 'static, services: AgentServices) -> Self {
        self.phases.push(agent.phase());
        self.pipeline.push(AgentRunner::new(agent, services));
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn results(&self) -> &[AgentResult] {
        self.pipeline.results()
    }

    pub async fn execute(&mut self, initial: Payload) -> SdlcOutcome {
        let auto_proceed = self.auto_proceed;
        let drive = self
            .pipeline
            .drive(initial, |_, result| match result.phase_result() {
                Some(pr) if pr.decision.halts() => ControlFlow::Break(Gate::Stop(pr)),
                Some(pr) if pr.decision == Decision::Review && !auto_proceed => {
                    ControlFlow::Break(Gate::Approve(pr))
                }
                _ => ControlFlow::Continue(()),
            })
            .await;

        match drive {
            Drive::Finished(data) => {
                info!("SDLC pipeline completed {} phases", self.phases.len());
                SdlcOutcome::Success {
                    data,
                    results: self.pipeline.results().to_vec(),
                    phases_completed: self.phases.clone(),
                }
            }
            Drive::Halted { index, result } => {
                let phase = self.phases[index];
                let completed_phases = self.phases[..index].to_vec();
                if result.status == AgentStatus::Blocked {
                    SdlcOutcome::Blocked {
                        blocked_phase: phase,
                        blocked_agent: result.agent_name,
                        errors: result.errors,
                        completed_phases,
                    }
                } else {
                    SdlcOutcome::Failed {
                        failed_phase: phase,
                        failed_agent: result.agent_name,
                        errors: result.errors,
                        completed_phases,
                    }
                }
            }
            Drive::Gated { index, value: Gate::Stop(pr) } => {
                warn!("Phase {} decided {}; stopping pipeline", pr.phase, pr.decision);
                SdlcOutcome::Stopped {
                    stopped_phase: self.phases[index],
                    reason: pr.recommendations,
                    risks: pr.risks,
                    completed_phases: self.phases[..index].to_vec(),
                }
            }
            Drive::Gated { index, value: Gate::Approve(pr) } => {
                info!("Phase {} requires approval before continuing", pr.phase);
                SdlcOutcome::RequiresApproval {
                    phase: self.phases[index],
                    recommendations: pr.recommendations,
                    artifacts: pr.artifacts,
                    next_steps: pr.next_steps,
                    completed_phases: self.phases[..index].to_vec(),
                }
            }
        }
    }
}
