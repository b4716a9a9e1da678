//! Sequential agent pipelines with a shared, merged context.

use std::convert::Infallible;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentResult, AgentRunner, AgentStatus, Payload};

/// Terminal state of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        data: Payload,
        results: Vec<AgentResult>,
    },
    Failed {
        failed_agent: String,
        errors: Vec<String>,
        completed_agents: Vec<String>,
    },
    Blocked {
        blocked_agent: String,
        errors: Vec<String>,
        completed_agents: Vec<String>,
    },
}

impl PipelineOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            PipelineOutcome::Success { .. } => "success",
            PipelineOutcome::Failed { .. } => "failed",
            PipelineOutcome::Blocked { .. } => "blocked",
        }
    }
}

/// How a drive over the agents ended.
pub(crate) enum Drive<B> {
    /// Every agent succeeded; holds the merged context.
    Finished(Payload),
    /// The agent at `index` ended `Failed` or `Blocked`.
    Halted { index: usize, result: AgentResult },
    /// The gate stopped the run after the agent at `index` succeeded.
    Gated { index: usize, value: B },
}

/// Runs agents strictly in order, threading a shared context.
///
/// After each successful agent its output is shallow-merged into the context;
/// on key collisions the later agent wins. The first `Failed` or `Blocked`
/// result stops the run. There are no retries and no rollback.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    agents: Vec<AgentRunner>,
    results: Vec<AgentResult>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an agent to the end of the pipeline.
    pub fn agent(mut self, runner: AgentRunner) -> Self {
        self.push(runner);
        self
    }

    pub fn push(&mut self, runner: AgentRunner) {
        self.agents.push(runner);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Results of the most recent run, in execution order.
    pub fn results(&self) -> &[AgentResult] {
        &self.results
    }

    pub(crate) fn agent_names(&self, upto: usize) -> Vec<String> {
        self.agents
            .iter()
            .take(upto)
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Run every agent in order.
    pub async fn execute(&mut self, initial: Payload) -> PipelineOutcome {
        match self.drive(initial, |_, _| ControlFlow::<Infallible>::Continue(())).await {
            Drive::Finished(data) => PipelineOutcome::Success {
                data,
                results: self.results.clone(),
            },
            Drive::Halted { index, result } => {
                let completed_agents = self.agent_names(index);
                if result.status == AgentStatus::Blocked {
                    PipelineOutcome::Blocked {
                        blocked_agent: result.agent_name,
                        errors: result.errors,
                        completed_agents,
                    }
                } else {
                    PipelineOutcome::Failed {
                        failed_agent: result.agent_name,
                        errors: result.errors,
                        completed_agents,
                    }
                }
            }
            Drive::Gated { value, .. } => match value {},
        }
    }

    /// Run agents in order, consulting `gate` after every successful agent.
    ///
    /// The gate sees the agent's index and result before its output is merged.
    pub(crate) async fn drive<B, G>(&mut self, initial: Payload, mut gate: G) -> Drive<B>
    where
        G: FnMut(usize, &AgentResult) -> ControlFlow<B>,
    {
        self.results.clear();
        let mut context = initial;
        let total = self.agents.len();

        info!("Starting pipeline: {} ({} agents)", self.name, total);

        for index in 0..total {
            let runner = &mut self.agents[index];
            info!("Executing agent [{}/{}]: {}", index + 1, total, runner.name());

            let result = runner.execute(&context).await;
            self.results.push(result.clone());

            match result.status {
                AgentStatus::Success => {}
                AgentStatus::Blocked => {
                    warn!("Pipeline '{}' blocked at agent '{}'", self.name, result.agent_name);
                    return Drive::Halted { index, result };
                }
                _ => {
                    error!("Pipeline '{}' failed at agent '{}'", self.name, result.agent_name);
                    return Drive::Halted { index, result };
                }
            }

            if let ControlFlow::Break(value) = gate(index, &result) {
                info!("Pipeline '{}' stopped after agent '{}'", self.name, result.agent_name);
                return Drive::Gated { index, value };
            }

            for (key, value) in result.data {
                if context.insert(key.clone(), value).is_some() {
                    debug!("Agent '{}' overwrote context key '{}'", result.agent_name, key);
                }
            }
        }

        info!("Pipeline '{}' completed successfully", self.name);
        Drive::Finished(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::services::AgentServices;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ConstAgent {
        name: String,
        output: Value,
        calls: Arc<AtomicUsize>,
    }

    impl ConstAgent {
        fn new(name: &str, output: Value) -> Self {
            Self {
                name: name.to_string(),
                output,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Agent for ConstAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.as_object().cloned().unwrap_or_default())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        fn name(&self) -> &str {
            "b"
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            anyhow::bail!("x")
        }
    }

    struct ContextProbe;

    #[async_trait]
    impl Agent for ContextProbe {
        fn name(&self) -> &str {
            "probe"
        }

        fn validate_input(&self, input: &Payload) -> Vec<String> {
            if input.get("from_a") == Some(&json!(true)) {
                Vec::new()
            } else {
                vec!["missing from_a".to_string()]
            }
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            Ok(Payload::new())
        }
    }

    fn runner(agent: impl Agent + 'static) -> AgentRunner {
        AgentRunner::new(agent, AgentServices::default())
    }

    #[tokio::test]
    async fn test_failure_stops_pipeline() {
        let c = ConstAgent::new("c", json!({}));
        let c_calls = c.calls.clone();
        let mut pipeline = Pipeline::new("abc")
            .agent(runner(ConstAgent::new("a", json!({ "k": 1 }))))
            .agent(runner(FailingAgent))
            .agent(runner(c));

        let outcome = pipeline.execute(Payload::new()).await;

        match outcome {
            PipelineOutcome::Failed {
                failed_agent,
                errors,
                completed_agents,
            } => {
                assert_eq!(failed_agent, "b");
                assert_eq!(errors, vec!["x".to_string()]);
                assert_eq!(completed_agents, vec!["a".to_string()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.results().len(), 2);
    }

    #[tokio::test]
    async fn test_context_threads_between_agents() {
        let mut pipeline = Pipeline::new("threaded")
            .agent(runner(ConstAgent::new("a", json!({ "from_a": true }))))
            .agent(runner(ContextProbe));

        let outcome = pipeline.execute(Payload::new()).await;
        assert_eq!(outcome.status(), "success");
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let mut pipeline = Pipeline::new("merge")
            .agent(runner(ConstAgent::new("a", json!({ "k": "a", "only_a": 1 }))))
            .agent(runner(ConstAgent::new("b", json!({ "k": "b" }))));

        let mut initial = Payload::new();
        initial.insert("seed".to_string(), json!("s"));

        match pipeline.execute(initial).await {
            PipelineOutcome::Success { data, results } => {
                assert_eq!(data["k"], json!("b"));
                assert_eq!(data["only_a"], json!(1));
                assert_eq!(data["seed"], json!("s"));
                assert_eq!(results.len(), 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blocked_reports_blocked_agent() {
        let mut pipeline = Pipeline::new("blocked").agent(runner(ContextProbe));

        let outcome = pipeline.execute(Payload::new()).await;
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["status"], json!("blocked"));
        assert_eq!(value["blocked_agent"], json!("probe"));
        assert_eq!(value["completed_agents"], json!([]));
    }

    #[tokio::test]
    async fn test_results_cleared_between_runs() {
        let mut pipeline = Pipeline::new("rerun").agent(runner(ConstAgent::new("a", json!({}))));
        pipeline.execute(Payload::new()).await;
        pipeline.execute(Payload::new()).await;

        assert_eq!(pipeline.results().len(), 1);
    }
}
