//! Shared services injected into every agent runner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use phaseflow_policy::PolicyChain;
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;

/// Services constructed once by the process entry point and handed to each runner.
#[derive(Debug, Clone)]
pub struct AgentServices {
    pub policies: Arc<PolicyChain>,
    pub metrics: Arc<ExecutionMetrics>,
}

impl AgentServices {
    pub fn new(policies: PolicyChain) -> Self {
        Self {
            policies: Arc::new(policies),
            metrics: Arc::new(ExecutionMetrics::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ExecutionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Default for AgentServices {
    /// An empty policy chain: only each agent's own guardrails apply.
    fn default() -> Self {
        Self::new(PolicyChain::new())
    }
}

/// Counters of agent executions by terminal status.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    executions: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    blocked: AtomicU64,
}

impl ExecutionMetrics {
    pub fn record(&self, status: AgentStatus) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            AgentStatus::Success => &self.successes,
            AgentStatus::Failed => &self.failures,
            AgentStatus::Blocked => &self.blocked,
            AgentStatus::Idle | AgentStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ExecutionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub blocked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record() {
        let metrics = ExecutionMetrics::default();
        metrics.record(AgentStatus::Success);
        metrics.record(AgentStatus::Blocked);
        metrics.record(AgentStatus::Failed);
        metrics.record(AgentStatus::Success);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.executions, 4);
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.blocked, 1);
    }

    #[test]
    fn test_default_services_have_no_shared_policies() {
        let services = AgentServices::default();
        assert!(services.policies.is_empty());
    }
}
