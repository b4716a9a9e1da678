//! The SDLC orchestrator: five phase agents run in order, with decision gates.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use phaseflow_agents::{DeploymentAgent, DesignAgent, FeasibilityAgent, PlannerAgent, TestingAgent};
use phaseflow_core::{
    AgentRunner, AgentServices, AgentStatus, ArtifactStore, Decision, Payload, Phase, Risk, SdlcPhaseResult,
};
use phaseflow_llm::LlmClient;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::outcome::{ExecutionLogEntry, OrchestrationOutcome};
use crate::recommendations::{heuristic_recommendations, LlmRecommendationStrategy};
use crate::report::{render_early_stop_report, render_final_report, ReportContext};
use crate::request::{OrchestratorRequest, PhaseResults};
use crate::risks::{heuristic_risks, LlmRiskStrategy};
use crate::strategy::{with_fallback, DecisionStrategy, OrchestrationMethod};
use crate::transition::{heuristic_transition, LlmTransitionStrategy, TransitionInput, TransitionVerdict};

const REPORT_SCOPE: &str = "orchestration";

/// Phases carried out by people; the orchestrator only records them.
fn is_manual(phase: Phase) -> bool {
    matches!(phase, Phase::Implementation | Phase::Maintenance)
}

/// Mutable state of one run.
struct RunState {
    run_id: Uuid,
    phase_results: PhaseResults,
    execution_log: Vec<ExecutionLogEntry>,
    all_artifacts: Vec<PathBuf>,
    completed_phases: Vec<Phase>,
    methods: Vec<OrchestrationMethod>,
}

impl RunState {
    fn new(prior_results: PhaseResults) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase_results: prior_results,
            execution_log: Vec::new(),
            all_artifacts: Vec::new(),
            completed_phases: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn add_artifacts(&mut self, artifacts: impl IntoIterator<Item = PathBuf>) {
        for artifact in artifacts {
            if !self.all_artifacts.contains(&artifact) {
                self.all_artifacts.push(artifact);
            }
        }
    }
}

/// Runs planning, feasibility, design, testing, and deployment agents.
///
/// Protocol outcomes (blocked, failed) take precedence over business decisions.
/// Transition, risk, and recommendation decisions use the LLM client when one
/// is set and fall back to heuristics otherwise.
pub struct Orchestrator {
    config: OrchestratorConfig,
    store: ArtifactStore,
    services: AgentServices,
    runners: BTreeMap<Phase, AgentRunner>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, services: AgentServices) -> Self {
        let store = config.artifact_store();
        let mut runners = BTreeMap::new();
        runners.insert(
            Phase::Planning,
            AgentRunner::new(PlannerAgent::new(store.clone()), services.clone()),
        );
        runners.insert(
            Phase::Feasibility,
            AgentRunner::new(FeasibilityAgent::new(store.clone()), services.clone()),
        );
        runners.insert(
            Phase::Design,
            AgentRunner::new(DesignAgent::new(store.clone()), services.clone()),
        );
        runners.insert(
            Phase::Testing,
            AgentRunner::new(TestingAgent::new(store.clone()), services.clone()),
        );
        runners.insert(
            Phase::Deployment,
            AgentRunner::new(DeploymentAgent::new(store.clone()), services.clone()),
        );

        Self {
            config,
            store,
            services,
            runners,
            llm: None,
        }
    }

    /// Build from configuration alone.
    pub fn from_config(config: OrchestratorConfig) -> OrchestratorResult<Self> {
        let services = config.services()?;
        Ok(Self::new(config, services))
    }

    pub fn with_llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn services(&self) -> &AgentServices {
        &self.services
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Phases that have an agent, in order.
    pub fn agent_phases(&self) -> Vec<Phase> {
        self.runners.keys().copied().collect()
    }

    /// Validation messages for a request. Empty means runnable.
    pub fn validate(&self, request: &OrchestratorRequest) -> Vec<String> {
        request.validate()
    }

    fn primary<I, O, S>(&self, make: impl FnOnce(Arc<dyn LlmClient>) -> S) -> Option<Box<dyn DecisionStrategy<I, O>>>
    where
        I: Sync + ?Sized,
        S: DecisionStrategy<I, O> + 'static,
    {
        self.llm
            .clone()
            .map(|client| Box::new(make(client)) as Box<dyn DecisionStrategy<I, O>>)
    }

    fn agent_input(&self, request: &OrchestratorRequest, phase_results: &PhaseResults) -> Payload {
        let mut input = Payload::new();
        input.insert("feature_request".to_string(), json!(request.feature_request));
        input.insert("project_context".to_string(), json!(request.project_context));
        input.insert(
            "technical_constraints".to_string(),
            json!(request.technical_constraints.resolved()),
        );
        input.insert("environment".to_string(), json!(request.environment));

        if let Some(issue) = phase_results.get(&Phase::Planning).and_then(|p| p.get("issue")) {
            input.insert("issue".to_string(), issue.clone());
        }
        for (phase, output) in phase_results {
            input.insert(format!("{}_result", phase), Value::Object(output.clone()));
        }
        input
    }

    /// Run the requested phases.
    ///
    /// Returns `Err` only for a missing prerequisite result; every business
    /// outcome is an [`OrchestrationOutcome`].
    pub async fn run(&mut self, request: OrchestratorRequest) -> OrchestratorResult<OrchestrationOutcome> {
        let plan = match request.plan() {
            Ok(plan) => plan,
            Err(errors) => {
                warn!("Orchestration request rejected: {:?}", errors);
                return Ok(OrchestrationOutcome::Blocked {
                    run_id: Uuid::new_v4(),
                    phase: None,
                    errors,
                    completed_phases: Vec::new(),
                });
            }
        };

        let mut state = RunState::new(request.prior_results.clone());
        info!(
            "Starting orchestration run {} over {} phase(s)",
            state.run_id,
            plan.phases.len()
        );

        for (position, &phase) in plan.phases.iter().enumerate() {
            if let Some(requires) = phase.prerequisite() {
                if !state.phase_results.contains_key(&requires) {
                    error!("Phase {} requires a {} result", phase, requires);
                    return Err(OrchestratorError::MissingPrerequisite { phase, requires });
                }
            }

            if is_manual(phase) {
                info!("Phase {} is performed manually; recording it", phase);
                state.execution_log.push(ExecutionLogEntry::manual(phase));
                continue;
            }

            let input = self.agent_input(&request, &state.phase_results);
            let Some(runner) = self.runners.get_mut(&phase) else {
                continue;
            };

            info!("Running phase {}", phase);
            let result = runner.execute(&input).await;
            let phase_result = result.phase_result();
            let decision = phase_result.as_ref().map(|r| r.decision);
            state
                .execution_log
                .push(ExecutionLogEntry::new(phase, result.status.as_str(), decision));
            if let Some(r) = &phase_result {
                state.add_artifacts(r.artifacts.iter().cloned());
            }

            match result.status {
                AgentStatus::Blocked => {
                    warn!("Phase {} blocked: {:?}", phase, result.errors);
                    return Ok(OrchestrationOutcome::Blocked {
                        run_id: state.run_id,
                        phase: Some(phase),
                        errors: result.errors,
                        completed_phases: state.completed_phases,
                    });
                }
                AgentStatus::Failed => {
                    error!("Phase {} failed: {:?}", phase, result.errors);
                    return Ok(OrchestrationOutcome::Failed {
                        run_id: state.run_id,
                        phase,
                        errors: result.errors,
                        completed_phases: state.completed_phases,
                    });
                }
                _ => {}
            }

            state.phase_results.insert(phase, result.data);
            state.completed_phases.push(phase);

            let Some(phase_result) = phase_result else {
                warn!("Phase {} published no phase result; continuing", phase);
                continue;
            };
            info!(
                "Phase {} decided {} ({:.2} confidence)",
                phase,
                phase_result.decision,
                phase_result.confidence()
            );

            if phase_result.decision.halts() {
                let reason = halt_reason(phase, &phase_result);
                return self.early_stop(&request, state, phase, reason);
            }

            let next_phase = plan.phases[position + 1..].iter().copied().find(|p| !is_manual(*p));
            let Some(next_phase) = next_phase else {
                continue;
            };

            let transition = with_fallback::<TransitionInput, TransitionVerdict>(
                "phase transition",
                self.primary(LlmTransitionStrategy::new),
                heuristic_transition,
            );
            let verdict = transition
                .decide(&TransitionInput {
                    phase,
                    next_phase,
                    result: phase_result.clone(),
                })
                .await;
            state.methods.push(verdict.method);
            let verdict = verdict.value;
            debug!("Transition {} -> {}: {}", phase, next_phase, verdict.reasoning);

            if phase_result.decision == Decision::Review
                && (!self.config.auto_proceed || !verdict.should_proceed)
            {
                info!("Phase {} requires approval before {}", phase, next_phase);
                let completed_phases = state
                    .completed_phases
                    .iter()
                    .copied()
                    .filter(|p| *p != phase)
                    .collect();
                return Ok(OrchestrationOutcome::RequiresApproval {
                    run_id: state.run_id,
                    phase,
                    recommendations: phase_result.recommendations,
                    artifacts: phase_result.artifacts,
                    next_steps: phase_result.next_steps,
                    completed_phases,
                });
            }

            if !verdict.should_proceed {
                return self.early_stop(&request, state, phase, verdict.reasoning);
            }
        }

        self.complete(request, state).await
    }

    fn early_stop(
        &self,
        request: &OrchestratorRequest,
        state: RunState,
        phase: Phase,
        reason: String,
    ) -> OrchestratorResult<OrchestrationOutcome> {
        warn!("Stopping at {}: {}", phase, reason);
        let final_report = render_early_stop_report(
            &ReportContext {
                run_id: state.run_id,
                feature_request: &request.feature_request,
                phase_results: &state.phase_results,
                execution_log: &state.execution_log,
                all_artifacts: &state.all_artifacts,
            },
            phase,
            &reason,
        );
        let report_path = self.store.save(
            REPORT_SCOPE,
            &ArtifactStore::timestamped_name("sdlc_early_stop_report"),
            &final_report,
        )?;

        Ok(OrchestrationOutcome::EarlyStop {
            run_id: state.run_id,
            stopped_at_phase: phase,
            reason,
            phase_results: state.phase_results,
            execution_log: state.execution_log,
            all_artifacts: state.all_artifacts,
            final_report,
            report_path,
        })
    }

    async fn complete(
        &self,
        request: OrchestratorRequest,
        mut state: RunState,
    ) -> OrchestratorResult<OrchestrationOutcome> {
        let risks = with_fallback::<PhaseResults, Vec<Risk>>(
            "risk aggregation",
            self.primary(LlmRiskStrategy::new),
            heuristic_risks,
        )
        .decide(&state.phase_results)
        .await;
        let recommendations = with_fallback::<PhaseResults, Vec<String>>(
            "recommendation synthesis",
            self.primary(LlmRecommendationStrategy::new),
            heuristic_recommendations,
        )
        .decide(&state.phase_results)
        .await;
        state.methods.push(risks.method);
        state.methods.push(recommendations.method);
        let method = OrchestrationMethod::combine(state.methods.iter().copied());

        let final_report = render_final_report(
            &ReportContext {
                run_id: state.run_id,
                feature_request: &request.feature_request,
                phase_results: &state.phase_results,
                execution_log: &state.execution_log,
                all_artifacts: &state.all_artifacts,
            },
            &risks.value,
            &recommendations.value,
            method,
        );
        let report_path = self.store.save(
            REPORT_SCOPE,
            &ArtifactStore::timestamped_name("sdlc_pipeline_report"),
            &final_report,
        )?;
        info!(
            "Orchestration run {} completed via {}; report at {}",
            state.run_id,
            method,
            report_path.display()
        );

        Ok(OrchestrationOutcome::Completed {
            run_id: state.run_id,
            feature_request: request.feature_request,
            phase_results: state.phase_results,
            execution_log: state.execution_log,
            all_artifacts: state.all_artifacts,
            final_report,
            report_path,
            orchestration_method: method,
            risks: risks.value,
            recommendations: recommendations.value,
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("output_root", &self.store.root())
            .field("auto_proceed", &self.config.auto_proceed)
            .field("llm", &self.llm.is_some())
            .finish()
    }
}

fn halt_reason(phase: Phase, result: &SdlcPhaseResult) -> String {
    if result.recommendations.is_empty() {
        format!("{} decided {}", phase, result.decision)
    } else {
        format!(
            "{} decided {}: {}",
            phase,
            result.decision,
            result.recommendations.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use phaseflow_core::{Agent, PHASE_RESULT_KEY};
    use tempfile::TempDir;

    fn orchestrator(temp: &TempDir) -> Orchestrator {
        let config = OrchestratorConfig::default().with_output_root(temp.path());
        Orchestrator::from_config(config).unwrap()
    }

    /// Plans like the real planner but asks for review.
    struct ReviewingPlanner {
        inner: PlannerAgent,
        confidence: f64,
    }

    #[async_trait]
    impl Agent for ReviewingPlanner {
        fn name(&self) -> &str {
            "reviewing_planner"
        }

        async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
            let mut output = self.inner.run(input).await?;
            let result = SdlcPhaseResult::new(Phase::Planning, Decision::Review, self.confidence)
                .with_recommendations(vec!["Confirm scope with product".to_string()]);
            output.insert(PHASE_RESULT_KEY.to_string(), result.to_value());
            Ok(output)
        }
    }

    fn reviewing(temp: &TempDir, auto_proceed: bool, confidence: f64) -> Orchestrator {
        let config = OrchestratorConfig::default()
            .with_output_root(temp.path())
            .with_auto_proceed(auto_proceed);
        let mut orchestrator = Orchestrator::from_config(config).unwrap();
        let planner = ReviewingPlanner {
            inner: PlannerAgent::new(orchestrator.store.clone()),
            confidence,
        };
        let services = orchestrator.services.clone();
        orchestrator
            .runners
            .insert(Phase::Planning, AgentRunner::new(planner, services));
        orchestrator
    }

    fn planning_to_feasibility() -> OrchestratorRequest {
        OrchestratorRequest::new("Add dark mode toggle").with_phases("planning", "feasibility")
    }

    #[tokio::test]
    async fn test_review_waits_for_approval() {
        let temp = TempDir::new().unwrap();
        let outcome = reviewing(&temp, false, 0.6).run(planning_to_feasibility()).await.unwrap();

        match outcome {
            OrchestrationOutcome::RequiresApproval {
                phase,
                recommendations,
                completed_phases,
                ..
            } => {
                assert_eq!(phase, Phase::Planning);
                assert_eq!(recommendations, vec!["Confirm scope with product".to_string()]);
                assert!(completed_phases.is_empty());
            }
            other => panic!("expected requires_approval, got {}", other.status()),
        }
        assert!(!temp.path().join("feasibility").exists());
    }

    #[tokio::test]
    async fn test_review_auto_proceeds() {
        let temp = TempDir::new().unwrap();
        let outcome = reviewing(&temp, true, 0.6).run(planning_to_feasibility()).await.unwrap();

        assert_eq!(outcome.status(), "completed");
        assert!(outcome.phase_results().unwrap().contains_key(&Phase::Feasibility));
    }

    #[tokio::test]
    async fn test_low_confidence_review_needs_approval_even_with_auto_proceed() {
        let temp = TempDir::new().unwrap();
        let outcome = reviewing(&temp, true, 0.4).run(planning_to_feasibility()).await.unwrap();

        assert_eq!(outcome.status(), "requires_approval");
    }

    #[test]
    fn test_fixed_agent_composition() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            orchestrator(&temp).agent_phases(),
            vec![
                Phase::Planning,
                Phase::Feasibility,
                Phase::Design,
                Phase::Testing,
                Phase::Deployment
            ]
        );
    }

    #[test]
    fn test_agent_input_carries_context() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&temp);
        let request = OrchestratorRequest::new("Add dark mode toggle").with_environment("production");

        let mut planning = Payload::new();
        planning.insert("issue".to_string(), json!({ "issue_title": "Dark mode" }));
        let mut results = PhaseResults::new();
        results.insert(Phase::Planning, planning);

        let input = orchestrator.agent_input(&request, &results);
        assert_eq!(input["environment"], json!("production"));
        assert_eq!(input["technical_constraints"]["no_redis"], json!(true));
        assert_eq!(input["issue"]["issue_title"], json!("Dark mode"));
        assert!(input.contains_key("planning_result"));
    }

    #[test]
    fn test_halt_reason_lists_recommendations() {
        let result = SdlcPhaseResult::new(Phase::Feasibility, Decision::NoGo, 0.3)
            .with_recommendations(vec!["Resolve blocker: Redis is forbidden".to_string()]);
        assert_eq!(
            halt_reason(Phase::Feasibility, &result),
            "feasibility decided no-go: Resolve blocker: Redis is forbidden"
        );
    }
}
