//! Deployment agent: rollout, rollback, and monitoring plans for an environment.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use phaseflow_core::{
    Agent, ArtifactStore, Decision, Likelihood, Payload, Phase, Risk, SdlcAgent, Severity,
    PHASE_RESULT_KEY,
};

use crate::issue::{prior_phase_result, text, validate_issue, Issue};

pub const DEFAULT_ENVIRONMENT: &str = "staging";

/// Deployment agent.
pub struct DeploymentAgent {
    store: ArtifactStore,
}

impl DeploymentAgent {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    fn is_production(environment: &str) -> bool {
        matches!(environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn deployment_plan(&self, issue: &Issue, environment: &str) -> String {
        let mut md = format!("# Deployment Plan: {}\n\n", issue.issue_title);
        md.push_str(&format!("**Environment:** {}\n\n", environment));
        md.push_str("## Steps\n\n");
        md.push_str("1. Take a backup of the database and configuration\n");
        md.push_str("2. Build and tag the release artifact\n");
        if issue.requires("database") {
            md.push_str("3. Apply database migrations\n");
        }
        md.push_str(&format!(
            "{}. Deploy to {}{}\n",
            if issue.requires("database") { 4 } else { 3 },
            environment,
            if Self::is_production(environment) { " behind a canary at 10% traffic" } else { "" }
        ));
        md.push_str("\n## Verification\n\n- Run smoke tests against the deployed build\n- Confirm health checks pass\n");
        md
    }

    pub fn rollback_plan(&self, issue: &Issue, environment: &str) -> String {
        let mut md = format!("# Rollback Plan: {}\n\n", issue.issue_title);
        md.push_str(&format!("1. Redeploy the previous release to {}\n", environment));
        if issue.requires("database") {
            md.push_str("2. Restore the database from the pre-deployment backup\n");
        }
        md.push_str("- Trigger: error rate above baseline for 5 minutes or failed health checks\n");
        md
    }

    pub fn monitoring_plan(&self, environment: &str) -> Value {
        let alert_window = if Self::is_production(environment) { "5m" } else { "15m" };
        json!({
            "metrics": ["error_rate", "latency_p95", "throughput"],
            "alerts": [
                { "metric": "error_rate", "threshold": "2x baseline", "window": alert_window },
                { "metric": "latency_p95", "threshold": "1.5x baseline", "window": alert_window },
            ],
            "dashboards": [format!("{} service overview", environment)],
        })
    }

    fn checklists(&self, issue: &Issue) -> (Vec<String>, Vec<String>) {
        let mut pre = vec![
            "[ ] Backup verified".to_string(),
            "[ ] Release notes written".to_string(),
            "[ ] All planned tests green".to_string(),
        ];
        if issue.requires("database") {
            pre.push("[ ] Migrations rehearsed on a copy of the data".to_string());
        }
        let post = vec![
            "[ ] Smoke tests pass".to_string(),
            "[ ] Error rate at baseline".to_string(),
            "[ ] Stakeholders notified".to_string(),
        ];
        (pre, post)
    }
}

#[async_trait]
impl Agent for DeploymentAgent {
    fn name(&self) -> &str {
        "deployment"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        let mut errors = validate_issue(input);
        if let Err(e) = prior_phase_result(input, "design_result") {
            errors.push(e);
        }
        match prior_phase_result(input, "testing_result") {
            Err(e) => errors.push(e),
            Ok(result) if result.decision != Decision::Go => errors.push(format!(
                "testing decision is {}; deployment requires go",
                result.decision
            )),
            Ok(_) => {}
        }
        errors
    }

    async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
        let issue = Issue::from_input(input)?;
        let environment = text(input, "environment").unwrap_or(DEFAULT_ENVIRONMENT);
        let production = Self::is_production(environment);

        let plan = self.deployment_plan(&issue, environment);
        let rollback = self.rollback_plan(&issue, environment);
        let (pre, post) = self.checklists(&issue);

        let plan_path = self.save_artifact(&plan, &ArtifactStore::timestamped_name("deployment_plan"))?;
        let rollback_path = self.save_artifact(&rollback, &ArtifactStore::timestamped_name("rollback_plan"))?;
        info!("Planned deployment of '{}' to {}", issue.issue_title, environment);

        let mut risks = Vec::new();
        let mut recommendations = vec!["Schedule the deployment window".to_string()];
        let confidence = if production {
            risks.push(
                Risk::new("operational", Severity::Medium, "Production rollout affects live users")
                    .with_probability(Likelihood::Low)
                    .with_mitigation("Canary release with automated rollback"),
            );
            recommendations.push("Deploy to staging first and soak for a day".to_string());
            0.9
        } else {
            0.95
        };

        let phase_result = self
            .phase_result(Decision::Go, confidence)
            .with_artifacts(vec![plan_path.clone(), rollback_path.clone()])
            .with_recommendations(recommendations)
            .with_risks(risks)
            .with_next_steps(vec![
                format!("Execute the deployment to {}", environment),
                "Monitor the release".to_string(),
            ]);

        let mut output = Payload::new();
        output.insert("deployment_plan".to_string(), json!(plan));
        output.insert("rollback_plan".to_string(), json!(rollback));
        output.insert("pre_deployment_checklist".to_string(), json!(pre));
        output.insert("post_deployment_checklist".to_string(), json!(post));
        output.insert("monitoring_plan".to_string(), self.monitoring_plan(environment));
        output.insert("environment".to_string(), json!(environment));
        output.insert("deployment_plan_path".to_string(), json!(plan_path));
        output.insert("rollback_plan_path".to_string(), json!(rollback_path));
        output.insert("artifacts".to_string(), json!([plan_path, rollback_path]));
        output.insert(PHASE_RESULT_KEY.to_string(), phase_result.to_value());
        Ok(output)
    }

    fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
        let mut violations = Vec::new();
        let plan = output.get("deployment_plan").and_then(Value::as_str).unwrap_or_default();
        if !plan.to_lowercase().contains("backup") {
            violations.push("Deployment plan has no backup step".to_string());
        }
        if output
            .get("rollback_plan")
            .and_then(Value::as_str)
            .map_or(true, |r| r.trim().is_empty())
        {
            violations.push("Deployment output has no rollback plan".to_string());
        }
        violations
    }
}

impl SdlcAgent for DeploymentAgent {
    fn phase(&self) -> Phase {
        Phase::Deployment
    }

    fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Priority;
    use phaseflow_core::SdlcPhaseResult;
    use tempfile::TempDir;

    fn issue(requirements: &[&str]) -> Issue {
        Issue {
            issue_title: "Sample".to_string(),
            issue_body: "Sample body".to_string(),
            story_points: 2,
            priority: Priority::P2,
            acceptance_criteria: vec!["a".to_string()],
            technical_requirements: requirements.iter().map(|r| r.to_string()).collect(),
            dependencies: Vec::new(),
        }
    }

    fn input(testing: Decision, environment: Option<&str>) -> Payload {
        let mut input = Payload::new();
        input.insert("issue".to_string(), serde_json::to_value(issue(&["Database schema changes and migrations"])).unwrap());
        input.insert(
            "design_result".to_string(),
            json!({ PHASE_RESULT_KEY: SdlcPhaseResult::new(Phase::Design, Decision::Go, 0.9).to_value() }),
        );
        input.insert(
            "testing_result".to_string(),
            json!({ PHASE_RESULT_KEY: SdlcPhaseResult::new(Phase::Testing, testing, 0.85).to_value() }),
        );
        if let Some(env) = environment {
            input.insert("environment".to_string(), json!(env));
        }
        input
    }

    #[test]
    fn test_validate_requires_testing_go() {
        let temp = TempDir::new().unwrap();
        let agent = DeploymentAgent::new(ArtifactStore::new(temp.path()));

        assert!(agent.validate_input(&input(Decision::Go, None)).is_empty());
        let errors = agent.validate_input(&input(Decision::Review, None));
        assert_eq!(errors, vec!["testing decision is review; deployment requires go".to_string()]);
    }

    #[test]
    fn test_plan_mentions_backup_and_migrations() {
        let temp = TempDir::new().unwrap();
        let agent = DeploymentAgent::new(ArtifactStore::new(temp.path()));
        let plan = agent.deployment_plan(&issue(&["Database schema changes and migrations"]), "staging");

        assert!(plan.contains("backup"));
        assert!(plan.contains("3. Apply database migrations"));
        assert!(plan.contains("4. Deploy to staging"));
    }

    #[tokio::test]
    async fn test_run_defaults_to_staging() {
        let temp = TempDir::new().unwrap();
        let agent = DeploymentAgent::new(ArtifactStore::new(temp.path()));

        let output = agent.run(&input(Decision::Go, None)).await.unwrap();
        let result = SdlcPhaseResult::from_output(&output).unwrap();

        assert_eq!(output["environment"], json!("staging"));
        assert!((result.confidence() - 0.95).abs() < 1e-9);
        assert!(result.risks.is_empty());
        assert_eq!(result.artifacts.len(), 2);
        assert!(agent.custom_guardrails(&output).is_empty());
    }

    #[tokio::test]
    async fn test_run_production_adds_operational_risk() {
        let temp = TempDir::new().unwrap();
        let agent = DeploymentAgent::new(ArtifactStore::new(temp.path()));

        let output = agent.run(&input(Decision::Go, Some("production"))).await.unwrap();
        let result = SdlcPhaseResult::from_output(&output).unwrap();

        assert!((result.confidence() - 0.9).abs() < 1e-9);
        assert_eq!(result.risks[0].risk_type, "operational");
        assert_eq!(output["monitoring_plan"]["alerts"][0]["window"], json!("5m"));
    }

    #[test]
    fn test_guardrails() {
        let temp = TempDir::new().unwrap();
        let agent = DeploymentAgent::new(ArtifactStore::new(temp.path()));
        let mut output = Payload::new();
        output.insert("deployment_plan".to_string(), json!("Deploy it"));
        output.insert("rollback_plan".to_string(), json!(""));

        assert_eq!(agent.custom_guardrails(&output).len(), 2);
    }
}
