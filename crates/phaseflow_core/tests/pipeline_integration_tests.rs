//! Pipelines of stub agents under shared services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use phaseflow_core::{Agent, AgentRunner, AgentServices, Payload, Pipeline, PipelineOutcome};
use phaseflow_policy::PolicyChain;

struct Emit {
    name: &'static str,
    output: Value,
    calls: Arc<AtomicUsize>,
}

impl Emit {
    fn new(name: &'static str, output: Value) -> Self {
        Self {
            name,
            output,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Agent for Emit {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.as_object().cloned().unwrap_or_default())
    }
}

/// Requires `ticket` in its input.
struct NeedsTicket;

#[async_trait]
impl Agent for NeedsTicket {
    fn name(&self) -> &str {
        "needs_ticket"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        if input.contains_key("ticket") {
            Vec::new()
        } else {
            vec!["ticket is required".to_string()]
        }
    }

    async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
        Ok(Payload::new())
    }
}

#[tokio::test]
async fn test_blocked_second_agent_stops_the_run() {
    let services = AgentServices::default();
    let third = Emit::new("third", json!({ "done": true }));
    let third_calls = third.calls.clone();

    let mut pipeline = Pipeline::new("three")
        .agent(AgentRunner::new(Emit::new("first", json!({ "summary": "ok" })), services.clone()))
        .agent(AgentRunner::new(NeedsTicket, services.clone()))
        .agent(AgentRunner::new(third, services.clone()));

    match pipeline.execute(Payload::new()).await {
        PipelineOutcome::Blocked {
            blocked_agent,
            errors,
            completed_agents,
        } => {
            assert_eq!(blocked_agent, "needs_ticket");
            assert_eq!(errors, vec!["ticket is required".to_string()]);
            assert_eq!(completed_agents, vec!["first".to_string()]);
        }
        other => panic!("expected blocked, got {}", other.status()),
    }
    assert_eq!(third_calls.load(Ordering::SeqCst), 0);

    let snapshot = services.metrics.snapshot();
    assert_eq!(snapshot.executions, 2);
    assert_eq!(snapshot.successes, 1);
    assert_eq!(snapshot.blocked, 1);
}

#[tokio::test]
async fn test_guardrail_violation_blocks_like_validation() {
    let services = AgentServices::new(PolicyChain::documentation());
    let marker = ["FIX", "ME"].concat();

    let mut pipeline = Pipeline::new("guarded")
        .agent(AgentRunner::new(Emit::new("first", json!({ "ticket": "T-1" })), services.clone()))
        .agent(AgentRunner::new(
            Emit::new("writer", json!({ "doc": format!("{}: wire the cache", marker) })),
            services.clone(),
        ));

    let outcome = pipeline.execute(Payload::new()).await;
    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["status"], json!("blocked"));
    assert_eq!(value["blocked_agent"], json!("writer"));
    assert_eq!(value["completed_agents"], json!(["first"]));
    assert_eq!(pipeline.results().len(), 2);
}

#[tokio::test]
async fn test_context_reaches_later_agents() {
    let mut pipeline = Pipeline::new("threaded")
        .agent(AgentRunner::new(
            Emit::new("first", json!({ "ticket": "T-1" })),
            AgentServices::default(),
        ))
        .agent(AgentRunner::new(NeedsTicket, AgentServices::default()));

    match pipeline.execute(Payload::new()).await {
        PipelineOutcome::Success { data, results } => {
            assert_eq!(data["ticket"], json!("T-1"));
            assert_eq!(results.len(), 2);
        }
        other => panic!("expected success, got {}", other.status()),
    }
}
