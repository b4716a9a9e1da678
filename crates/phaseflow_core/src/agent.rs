//! The agent execution protocol.
//!
//! An [`Agent`] supplies three things: input validation, domain logic, and
//! optional agent-specific guardrails. An [`AgentRunner`] wraps an agent with
//! its lifecycle status and the injected [`AgentServices`], and turns every
//! call into exactly one [`AgentResult`].
//!
//! # Execution
//!
//! 1. Status moves from `Idle` to `Running`.
//! 2. `validate_input` errors produce `Blocked`; domain logic does not run.
//! 3. `run` executes. An `Err` or a panic produces `Failed`.
//! 4. The policy chain and `custom_guardrails` inspect the output. Any
//!    violation produces `Blocked`; files already written stay on disk.
//! 5. Otherwise the result is `Success` with the output as `data`.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use phaseflow_core::{Agent, AgentRunner, AgentServices, Payload};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Agent for Echo {
//!     fn name(&self) -> &str { "echo" }
//!
//!     async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
//!         Ok(input.clone())
//!     }
//! }
//!
//! let mut runner = AgentRunner::new(Echo, AgentServices::default());
//! let result = runner.execute(&Payload::new()).await;
//! assert!(result.is_success());
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::phase::SdlcPhaseResult;
use crate::services::AgentServices;

/// String-keyed JSON map passed between agents.
pub type Payload = Map<String, Value>;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    Blocked,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Running => "running",
            AgentStatus::Success => "success",
            AgentStatus::Failed => "failed",
            AgentStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The record of one agent execution. Read-only once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub status: AgentStatus,
    pub timestamp: DateTime<Utc>,
    pub data: Payload,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: Payload,
}

impl AgentResult {
    fn started(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Running,
            timestamp: Utc::now(),
            data: Payload::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            metrics: Payload::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }

    /// The phase result embedded in `data`, for SDLC agents.
    pub fn phase_result(&self) -> Option<SdlcPhaseResult> {
        SdlcPhaseResult::from_output(&self.data)
    }
}

/// A unit of work with validation, domain logic, and guardrails.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name for this agent's role.
    fn name(&self) -> &str;

    /// Check the input before any domain logic runs.
    ///
    /// Default: accept everything.
    fn validate_input(&self, _input: &Payload) -> Vec<String> {
        Vec::new()
    }

    /// Domain logic. Any error is captured by the runner as `Failed`.
    async fn run(&self, input: &Payload) -> anyhow::Result<Payload>;

    /// Agent-specific output checks, run after the shared policy chain.
    ///
    /// Default: none.
    fn custom_guardrails(&self, _output: &Payload) -> Vec<String> {
        Vec::new()
    }
}

/// Runs an agent under the execution protocol and keeps its lifecycle state.
pub struct AgentRunner {
    agent: Box<dyn Agent>,
    services: AgentServices,
    status: AgentStatus,
    last_result: Option<AgentResult>,
}

impl AgentRunner {
    pub fn new(agent: impl Agent + 'static, services: AgentServices) -> Self {
        Self::from_boxed(Box::new(agent), services)
    }

    pub fn from_boxed(agent: Box<dyn Agent>, services: AgentServices) -> Self {
        Self {
            agent,
            services,
            status: AgentStatus::Idle,
            last_result: None,
        }
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// The result of the most recent execution.
    pub fn last_result(&self) -> Option<&AgentResult> {
        self.last_result.as_ref()
    }

    /// Shared policy violations followed by the agent's own guardrail messages.
    pub fn apply_guardrails(&self, output: &Payload) -> Vec<String> {
        let mut violations: Vec<String> = self
            .services
            .policies
            .check(output)
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        violations.extend(self.agent.custom_guardrails(output));
        violations
    }

    /// Execute the agent. Never fails; every outcome is an `AgentResult`.
    pub async fn execute(&mut self, input: &Payload) -> AgentResult {
        let name = self.agent.name().to_string();
        self.status = AgentStatus::Running;
        let started = Instant::now();
        let mut result = AgentResult::started(&name);

        info!("Executing agent: {}", name);

        let validation_errors = self.agent.validate_input(input);
        if !validation_errors.is_empty() {
            warn!("Agent '{}' blocked by input validation: {:?}", name, validation_errors);
            result.status = AgentStatus::Blocked;
            result.errors = validation_errors;
        } else {
            match AssertUnwindSafe(self.agent.run(input)).catch_unwind().await {
                Ok(Ok(output)) => {
                    let violations = self.apply_guardrails(&output);
                    if violations.is_empty() {
                        result.status = AgentStatus::Success;
                    } else {
                        warn!("Agent '{}' blocked by guardrails: {:?}", name, violations);
                        result.status = AgentStatus::Blocked;
                        result.errors = violations;
                    }
                    result.data = output;
                }
                Ok(Err(e)) => {
                    error!("Agent '{}' failed: {:#}", name, e);
                    result.status = AgentStatus::Failed;
                    result.errors = vec![format!("{:#}", e)];
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Agent '{}' panicked: {}", name, message);
                    result.status = AgentStatus::Failed;
                    result.errors = vec![message];
                }
            }
        }

        let elapsed = started.elapsed().as_millis() as u64;
        result.metrics.insert("duration_ms".to_string(), Value::from(elapsed));
        self.services.metrics.record(result.status);
        debug!("Agent '{}' finished with status {} in {}ms", name, result.status, elapsed);

        self.status = result.status;
        self.last_result = Some(result.clone());
        result
    }
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunner")
            .field("agent", &self.agent.name())
            .field("status", &self.status)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: agent panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseflow_policy::PolicyChain;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &str {
            "echo"
        }

        async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
            Ok(input.clone())
        }
    }

    struct ErrorAgent;

    #[async_trait]
    impl Agent for ErrorAgent {
        fn name(&self) -> &str {
            "error"
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            anyhow::bail!("database unreachable")
        }
    }

    struct PanicAgent;

    #[async_trait]
    impl Agent for PanicAgent {
        fn name(&self) -> &str {
            "panic"
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            panic!("index out of bounds")
        }
    }

    struct StrictAgent {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Agent for StrictAgent {
        fn name(&self) -> &str {
            "strict"
        }

        fn validate_input(&self, input: &Payload) -> Vec<String> {
            if input.contains_key("request") {
                Vec::new()
            } else {
                vec!["request is required".to_string()]
            }
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(Payload::new())
        }
    }

    struct GuardedAgent;

    #[async_trait]
    impl Agent for GuardedAgent {
        fn name(&self) -> &str {
            "guarded"
        }

        async fn run(&self, _input: &Payload) -> anyhow::Result<Payload> {
            let mut out = Payload::new();
            out.insert("plan".to_string(), json!("deploy on friday"));
            Ok(out)
        }

        fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
            let plan = output.get("plan").and_then(|v| v.as_str()).unwrap_or_default();
            if plan.contains("backup") {
                Vec::new()
            } else {
                vec!["plan must mention backup".to_string()]
            }
        }
    }

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_success_carries_output() {
        let mut runner = AgentRunner::new(EchoAgent, AgentServices::default());
        assert_eq!(runner.status(), AgentStatus::Idle);

        let result = runner.execute(&payload(json!({ "a": 1 }))).await;

        assert_eq!(result.status, AgentStatus::Success);
        assert_eq!(result.data["a"], json!(1));
        assert!(result.errors.is_empty());
        assert!(result.metrics.contains_key("duration_ms"));
        assert_eq!(runner.status(), AgentStatus::Success);
        assert_eq!(runner.last_result().unwrap().agent_name, "echo");
    }

    #[tokio::test]
    async fn test_error_becomes_failed() {
        let mut runner = AgentRunner::new(ErrorAgent, AgentServices::default());
        let result = runner.execute(&Payload::new()).await;

        assert_eq!(result.status, AgentStatus::Failed);
        assert_eq!(result.errors, vec!["database unreachable".to_string()]);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed() {
        let mut runner = AgentRunner::new(PanicAgent, AgentServices::default());
        let result = runner.execute(&Payload::new()).await;

        assert_eq!(result.status, AgentStatus::Failed);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_validation_blocks_before_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut runner = AgentRunner::new(StrictAgent { ran: ran.clone() }, AgentServices::default());

        let result = runner.execute(&Payload::new()).await;

        assert_eq!(result.status, AgentStatus::Blocked);
        assert_eq!(result.errors, vec!["request is required".to_string()]);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_custom_guardrail_blocks() {
        let mut runner = AgentRunner::new(GuardedAgent, AgentServices::default());
        let result = runner.execute(&Payload::new()).await;

        assert_eq!(result.status, AgentStatus::Blocked);
        assert_eq!(result.errors, vec!["plan must mention backup".to_string()]);
    }

    #[tokio::test]
    async fn test_policy_chain_blocks() {
        let services = AgentServices::new(PolicyChain::documentation());
        let mut runner = AgentRunner::new(EchoAgent, services);
        let result = runner.execute(&payload(json!({ "notes": "FIXME later" }))).await;

        assert_eq!(result.status, AgentStatus::Blocked);
        assert!(result.errors[0].contains("no_placeholder"));
    }

    #[tokio::test]
    async fn test_default_chain_skips_policies() {
        let services = AgentServices::default();
        let mut runner = AgentRunner::new(EchoAgent, services.clone());
        let result = runner.execute(&payload(json!({ "notes": "FIXME later" }))).await;

        assert_eq!(result.status, AgentStatus::Success);
        assert_eq!(services.metrics.snapshot().successes, 1);
    }

    #[tokio::test]
    async fn test_result_overwritten_each_call() {
        let mut runner = AgentRunner::new(EchoAgent, AgentServices::default());
        runner.execute(&payload(json!({ "run": 1 }))).await;
        runner.execute(&payload(json!({ "run": 2 }))).await;

        assert_eq!(runner.last_result().unwrap().data["run"], json!(2));
    }
}
