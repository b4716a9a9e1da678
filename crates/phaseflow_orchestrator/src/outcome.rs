//! Terminal states of an orchestration run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use phaseflow_core::{Decision, Phase, Risk};

use crate::request::PhaseResults;
use crate::strategy::OrchestrationMethod;

/// Compact record of one visited phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub phase: Phase,
    /// Agent status (`success`, `blocked`, `failed`) or `manual`
    pub status: String,
    pub decision: Option<Decision>,
}

impl ExecutionLogEntry {
    pub fn new(phase: Phase, status: impl Into<String>, decision: Option<Decision>) -> Self {
        Self {
            phase,
            status: status.into(),
            decision,
        }
    }

    pub fn manual(phase: Phase) -> Self {
        Self::new(phase, "manual", None)
    }
}

/// Result of [`Orchestrator::run`](crate::Orchestrator::run).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrchestrationOutcome {
    Completed {
        run_id: Uuid,
        feature_request: String,
        phase_results: PhaseResults,
        execution_log: Vec<ExecutionLogEntry>,
        all_artifacts: Vec<PathBuf>,
        final_report: String,
        report_path: PathBuf,
        orchestration_method: OrchestrationMethod,
        risks: Vec<Risk>,
        recommendations: Vec<String>,
    },
    EarlyStop {
        run_id: Uuid,
        stopped_at_phase: Phase,
        reason: String,
        phase_results: PhaseResults,
        execution_log: Vec<ExecutionLogEntry>,
        all_artifacts: Vec<PathBuf>,
        final_report: String,
        report_path: PathBuf,
    },
    RequiresApproval {
        run_id: Uuid,
        phase: Phase,
        recommendations: Vec<String>,
        artifacts: Vec<PathBuf>,
        next_steps: Vec<String>,
        completed_phases: Vec<Phase>,
    },
    Blocked {
        run_id: Uuid,
        /// `None` when the request itself failed validation
        phase: Option<Phase>,
        errors: Vec<String>,
        completed_phases: Vec<Phase>,
    },
    Failed {
        run_id: Uuid,
        phase: Phase,
        errors: Vec<String>,
        completed_phases: Vec<Phase>,
    },
}

impl OrchestrationOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            OrchestrationOutcome::Completed { .. } => "completed",
            OrchestrationOutcome::EarlyStop { .. } => "early_stop",
            OrchestrationOutcome::RequiresApproval { .. } => "requires_approval",
            OrchestrationOutcome::Blocked { .. } => "blocked",
            OrchestrationOutcome::Failed { .. } => "failed",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            OrchestrationOutcome::Completed { run_id, .. }
            | OrchestrationOutcome::EarlyStop { run_id, .. }
            | OrchestrationOutcome::RequiresApproval { run_id, .. }
            | OrchestrationOutcome::Blocked { run_id, .. }
            | OrchestrationOutcome::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, OrchestrationOutcome::Completed { .. })
    }

    /// Phase outputs gathered before the run ended, where the outcome carries them.
    pub fn phase_results(&self) -> Option<&PhaseResults> {
        match self {
            OrchestrationOutcome::Completed { phase_results, .. }
            | OrchestrationOutcome::EarlyStop { phase_results, .. } => Some(phase_results),
            _ => None,
        }
    }

    pub fn report_path(&self) -> Option<&PathBuf> {
        match self {
            OrchestrationOutcome::Completed { report_path, .. }
            | OrchestrationOutcome::EarlyStop { report_path, .. } => Some(report_path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_with_status_tag() {
        let outcome = OrchestrationOutcome::Blocked {
            run_id: Uuid::nil(),
            phase: None,
            errors: vec!["feature_request is required".to_string()],
            completed_phases: Vec::new(),
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], json!("blocked"));
        assert_eq!(value["phase"], json!(null));
        assert_eq!(outcome.status(), "blocked");
        assert!(outcome.phase_results().is_none());
    }

    #[test]
    fn test_log_entry_shape() {
        let entry = ExecutionLogEntry::new(Phase::Feasibility, "success", Some(Decision::NoGo));
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({ "phase": "feasibility", "status": "success", "decision": "no-go" })
        );
        assert_eq!(ExecutionLogEntry::manual(Phase::Implementation).status, "manual");
    }
}
