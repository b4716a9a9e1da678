//! Orchestration requests and their validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use phaseflow_agents::{TechnicalConstraints, DEFAULT_ENVIRONMENT};
use phaseflow_core::{Payload, Phase};

/// Phase outputs keyed by phase, in phase order.
pub type PhaseResults = BTreeMap<Phase, Payload>;

fn default_start_phase() -> String {
    Phase::Planning.as_str().to_string()
}

fn default_end_phase() -> String {
    Phase::Deployment.as_str().to_string()
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// One orchestration run.
///
/// Phases are kept as strings so that an unknown name is reported as a
/// validation message instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorRequest {
    pub feature_request: String,
    #[serde(default)]
    pub project_context: String,
    #[serde(default)]
    pub technical_constraints: TechnicalConstraints,
    #[serde(default = "default_start_phase")]
    pub start_phase: String,
    #[serde(default = "default_end_phase")]
    pub end_phase: String,
    #[serde(default)]
    pub skip_phases: Vec<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Outputs of phases completed in an earlier run, to resume from.
    #[serde(default)]
    pub prior_results: PhaseResults,
}

/// The phases a validated request will visit, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub phases: Vec<Phase>,
}

impl OrchestratorRequest {
    pub fn new(feature_request: impl Into<String>) -> Self {
        Self {
            feature_request: feature_request.into(),
            project_context: String::new(),
            technical_constraints: TechnicalConstraints::default(),
            start_phase: default_start_phase(),
            end_phase: default_end_phase(),
            skip_phases: Vec::new(),
            environment: default_environment(),
            prior_results: PhaseResults::new(),
        }
    }

    pub fn with_project_context(mut self, context: impl Into<String>) -> Self {
        self.project_context = context.into();
        self
    }

    pub fn with_constraint(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.technical_constraints = self.technical_constraints.set(flag, enabled);
        self
    }

    pub fn with_phases(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_phase = start.into();
        self.end_phase = end.into();
        self
    }

    pub fn skipping(mut self, phase: impl Into<String>) -> Self {
        self.skip_phases.push(phase.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_prior_result(mut self, phase: Phase, output: Payload) -> Self {
        self.prior_results.insert(phase, output);
        self
    }

    /// Every validation message for this request. Empty means runnable.
    pub fn validate(&self) -> Vec<String> {
        self.plan().err().unwrap_or_default()
    }

    /// Resolve the phases to run, or every validation message.
    pub fn plan(&self) -> Result<RunPlan, Vec<String>> {
        let mut errors = Vec::new();

        if self.feature_request.trim().is_empty() {
            errors.push("feature_request is required".to_string());
        }

        let mut parse = |field: &str, name: &str| match name.parse::<Phase>() {
            Ok(phase) => Some(phase),
            Err(_) => {
                errors.push(format!("{} '{}' is not a valid phase", field, name));
                None
            }
        };

        let start = parse("start_phase", &self.start_phase);
        let end = parse("end_phase", &self.end_phase);
        let skipped: Vec<Phase> = self
            .skip_phases
            .iter()
            .filter_map(|name| parse("skip_phases entry", name))
            .collect();

        if let (Some(start), Some(end)) = (start, end) {
            if start.index() > end.index() {
                errors.push(format!(
                    "start_phase '{}' comes after end_phase '{}'",
                    start, end
                ));
            }
        }

        match (start, end) {
            (Some(start), Some(end)) if errors.is_empty() => Ok(RunPlan {
                phases: Phase::range(start, end)
                    .into_iter()
                    .filter(|p| !skipped.contains(p))
                    .collect(),
            }),
            _ => Err(errors),
        }
    }
}
