//! Design agent: high-level and low-level design, ADRs, and diagrams.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use phaseflow_core::{Agent, ArtifactStore, Decision, Payload, Phase, Risk, SdlcAgent, PHASE_RESULT_KEY};

use crate::constraints::TechnicalConstraints;
use crate::issue::{prior_phase_result, validate_issue, Issue};

/// A building block of the proposed design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub responsibility: String,
    pub technology: String,
}

impl Component {
    fn new(name: &str, responsibility: &str, technology: &str) -> Self {
        Self {
            name: name.to_string(),
            responsibility: responsibility.to_string(),
            technology: technology.to_string(),
        }
    }
}

/// An architecture decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adr {
    pub id: String,
    pub title: String,
    pub status: String,
    pub context: String,
    pub decision: String,
    pub consequences: String,
}

/// Design agent.
pub struct DesignAgent {
    store: ArtifactStore,
}

impl DesignAgent {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Components for the issue. Forbidden capabilities get an alternative.
    pub fn components(&self, issue: &Issue, constraints: &TechnicalConstraints) -> Vec<Component> {
        let mut components = vec![Component::new(
            "Core service",
            "Business rules for the feature",
            "Application service module",
        )];

        if issue.requires("api") {
            components.push(Component::new("API layer", "Request validation and routing", "REST endpoints"));
        }
        if issue.requires("frontend") || issue.requires("ui") {
            components.push(Component::new("UI components", "User interaction and state", "Frontend component library"));
        }
        if issue.requires("database") {
            components.push(Component::new("Persistence", "Schema and migrations", "Relational database"));
        }
        if issue.requires("auth") {
            components.push(Component::new("Access control", "Authorization checks", "Existing auth middleware"));
        }
        if issue.requires("cache") || issue.requires("redis") {
            let technology = if constraints.forbids("no_redis") { "In-process LRU cache" } else { "Redis" };
            components.push(Component::new("Cache", "Hot data lookups", technology));
        }
        if issue.requires("email") || issue.requires("smtp") {
            let technology = if constraints.forbids("no_email") {
                "In-app notification outbox"
            } else {
                "SMTP relay"
            };
            components.push(Component::new("Notifications", "User notifications", technology));
        }
        components
    }

    /// ADRs for significant decisions: new persistence, caching, or a wide design.
    pub fn adrs(&self, issue: &Issue, components: &[Component]) -> Vec<Adr> {
        let year = Utc::now().year();
        let mut adrs: Vec<Adr> = Vec::new();
        let next_id = |adrs: &[Adr]| format!("ADR-{}-{}", year, adrs.len() + 1);

        for component in components {
            let (title, context) = match component.name.as_str() {
                "Persistence" => ("Store feature data in the relational database", "The feature needs durable state."),
                "Cache" => ("Caching strategy for hot data", "Read paths need low latency."),
                "Notifications" => ("Notification delivery channel", "Users must be informed of changes."),
                _ => continue,
            };
            adrs.push(Adr {
                id: next_id(&adrs),
                title: title.to_string(),
                status: "proposed".to_string(),
                context: context.to_string(),
                decision: format!("Use {}", component.technology),
                consequences: format!("{} becomes part of the runtime footprint", component.technology),
            });
        }

        if components.len() >= 4 || issue.story_points >= 8 {
            adrs.push(Adr {
                id: next_id(&adrs),
                title: format!("Module boundaries for {}", issue.issue_title),
                status: "proposed".to_string(),
                context: format!("The feature spans {} components.", components.len()),
                decision: "Keep each component behind a narrow interface owned by the core service".to_string(),
                consequences: "More interfaces to maintain, simpler independent testing".to_string(),
            });
        }
        adrs
    }

    fn diagram(&self, components: &[Component]) -> String {
        let mut mermaid = String::from("```mermaid\nflowchart LR\n    User([User])\n");
        for (i, component) in components.iter().enumerate() {
            mermaid.push_str(&format!("    C{}[\"{}\"]\n", i, component.name));
        }
        let entry = components
            .iter()
            .position(|c| c.name == "UI components" || c.name == "API layer")
            .unwrap_or(0);
        mermaid.push_str(&format!("    User --> C{}\n", entry));
        for i in 0..components.len() {
            if i != entry && i != 0 {
                mermaid.push_str(&format!("    C0 --> C{}\n", i));
            }
        }
        if entry != 0 {
            mermaid.push_str(&format!("    C{} --> C0\n", entry));
        }
        mermaid.push_str("```\n");
        mermaid
    }

    fn render_hld(
        &self,
        issue: &Issue,
        components: &[Component],
        constraints: &[String],
        considered_risks: &[Risk],
        diagram: &str,
    ) -> String {
        let mut md = format!("# High-Level Design: {}\n\n", issue.issue_title);
        md.push_str(&format!("**Date:** {}\n\n", Utc::now().format("%Y-%m-%d")));
        md.push_str("## Overview\n\n");
        md.push_str(&issue.issue_body);
        md.push_str("\n\n## Components\n\n| Component | Responsibility | Technology |\n|-----------|----------------|------------|\n");
        for c in components {
            md.push_str(&format!("| {} | {} | {} |\n", c.name, c.responsibility, c.technology));
        }
        md.push_str("\n## Architecture\n\n");
        md.push_str(diagram);

        md.push_str("\n## Constraints\n\n");
        if constraints.is_empty() {
            md.push_str("No technical constraints in force.\n");
        }
        for flag in constraints {
            let capability = flag.trim_start_matches("no_").replace('_', " ");
            md.push_str(&format!("- No {}: the design does not depend on it\n", capability));
        }

        if !considered_risks.is_empty() {
            md.push_str("\n## Risks Considered\n\n");
            for risk in considered_risks {
                md.push_str(&format!("- [{}] {}: {}\n", risk.severity, risk.risk_type, risk.description));
            }
        }
        md
    }

    fn render_lld(&self, issue: &Issue, components: &[Component]) -> String {
        let mut md = format!("# Low-Level Design: {}\n\n", issue.issue_title);
        for c in components {
            md.push_str(&format!("## {}\n\n", c.name));
            md.push_str(&format!("- Responsibility: {}\n", c.responsibility));
            md.push_str(&format!("- Technology: {}\n", c.technology));
            md.push_str("- Error handling: failures are returned to the caller with context\n\n");
        }
        md.push_str("## Requirement Mapping\n\n");
        for requirement in &issue.technical_requirements {
            md.push_str(&format!("- {}\n", requirement));
        }
        md
    }

    fn render_adrs(&self, adrs: &[Adr]) -> String {
        let mut md = String::from("# Architecture Decision Records\n\n");
        for adr in adrs {
            md.push_str(&format!("## {}: {}\n\n", adr.id, adr.title));
            md.push_str(&format!("**Status:** {}\n\n", adr.status));
            md.push_str(&format!("**Context:** {}\n\n", adr.context));
            md.push_str(&format!("**Decision:** {}\n\n", adr.decision));
            md.push_str(&format!("**Consequences:** {}\n\n", adr.consequences));
        }
        md
    }

    fn review_checklist(&self, adrs: &[Adr]) -> Vec<String> {
        let mut checklist = vec![
            "[ ] Components map to every technical requirement".to_string(),
            "[ ] Error handling is defined for each component".to_string(),
            "[ ] Security review completed".to_string(),
            "[ ] Performance expectations documented".to_string(),
        ];
        if !adrs.is_empty() {
            checklist.push("[ ] ADRs reviewed by the architecture group".to_string());
        }
        checklist
    }
}

#[async_trait]
impl Agent for DesignAgent {
    fn name(&self) -> &str {
        "design"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        let mut errors = validate_issue(input);
        match prior_phase_result(input, "feasibility_result") {
            Err(e) => errors.push(e),
            Ok(result) if result.decision == Decision::NoGo => {
                errors.push("feasibility decision is no-go; design cannot proceed".to_string())
            }
            Ok(_) => {}
        }
        errors
    }

    async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
        let issue = Issue::from_input(input)?;
        let constraints: TechnicalConstraints = match input.get("technical_constraints") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => TechnicalConstraints::default(),
        };
        let considered_risks = prior_phase_result(input, "feasibility_result")
            .map(|r| r.risks)
            .unwrap_or_default();

        let components = self.components(&issue, &constraints);
        let adrs = self.adrs(&issue, &components);
        let diagram = self.diagram(&components);
        let applied = constraints.enabled_flags();

        let hld = self.render_hld(&issue, &components, &applied, &considered_risks, &diagram);
        let lld = self.render_lld(&issue, &components);

        let hld_path = self.save_artifact(&hld, &ArtifactStore::timestamped_name("hld"))?;
        let lld_path = self.save_artifact(&lld, &ArtifactStore::timestamped_name("lld"))?;
        let mut artifacts = vec![hld_path.clone(), lld_path.clone()];
        let adr_path = if adrs.is_empty() {
            None
        } else {
            let path = self.save_artifact(&self.render_adrs(&adrs), &ArtifactStore::timestamped_name("adrs"))?;
            artifacts.push(path.clone());
            Some(path)
        };

        info!(
            "Designed '{}' with {} components and {} ADRs",
            issue.issue_title,
            components.len(),
            adrs.len()
        );

        let mut recommendations = vec!["Review the HLD with the team before testing".to_string()];
        if !adrs.is_empty() {
            recommendations.push("Approve the proposed ADRs".to_string());
        }
        let phase_result = self
            .phase_result(Decision::Go, 0.9)
            .with_artifacts(artifacts.clone())
            .with_recommendations(recommendations)
            .with_next_steps(vec!["Create the test strategy".to_string()]);

        let mut output = Payload::new();
        output.insert("hld".to_string(), json!(hld));
        output.insert("lld".to_string(), json!(lld));
        output.insert("components".to_string(), serde_json::to_value(&components)?);
        output.insert("adrs".to_string(), serde_json::to_value(&adrs)?);
        output.insert("diagrams".to_string(), json!({ "architecture": diagram }));
        output.insert("review_checklist".to_string(), json!(self.review_checklist(&adrs)));
        output.insert("hld_path".to_string(), json!(hld_path));
        output.insert("lld_path".to_string(), json!(lld_path));
        output.insert("adr_path".to_string(), json!(adr_path));
        output.insert("artifacts".to_string(), json!(artifacts));
        output.insert("constraints_applied".to_string(), json!(applied));
        output.insert(PHASE_RESULT_KEY.to_string(), phase_result.to_value());
        Ok(output)
    }

    fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
        let mut violations = Vec::new();
        let blank = |key: &str| output.get(key).and_then(Value::as_str).map_or(true, |s| s.trim().is_empty());

        if blank("hld") {
            violations.push("Design output has no HLD".to_string());
        }
        if blank("lld") {
            violations.push("Design output has no LLD".to_string());
        }
        if output.get("diagrams").and_then(Value::as_object).map_or(true, |d| d.is_empty()) {
            violations.push("Design output has no diagrams".to_string());
        }

        let no_redis = output
            .get("constraints_applied")
            .and_then(Value::as_array)
            .map_or(false, |flags| flags.iter().any(|f| f == "no_redis"));
        if no_redis {
            let hld = output.get("hld").and_then(Value::as_str).unwrap_or_default().to_lowercase();
            if hld.contains("redis") && !hld.contains("no redis") {
                violations.push("HLD depends on Redis while no_redis is in force".to_string());
            }
        }
        violations
    }
}

impl SdlcAgent for DesignAgent {
    fn phase(&self) -> Phase {
        Phase::Design
    }

    fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Priority;
    use phaseflow_core::{SdlcPhaseResult, Severity};
    use tempfile::TempDir;

    fn issue(requirements: &[&str], points: u32) -> Issue {
        Issue {
            issue_title: "Sample".to_string(),
            issue_body: "Sample body".to_string(),
            story_points: points,
            priority: Priority::P2,
            acceptance_criteria: vec!["a".to_string()],
            technical_requirements: requirements.iter().map(|r| r.to_string()).collect(),
            dependencies: Vec::new(),
        }
    }

    fn input(issue: &Issue, feasibility: Decision) -> Payload {
        let result = SdlcPhaseResult::new(Phase::Feasibility, feasibility, 0.8)
            .with_risks(vec![Risk::new("requirements", Severity::Medium, "Few criteria")]);
        let mut input = Payload::new();
        input.insert("issue".to_string(), serde_json::to_value(issue).unwrap());
        input.insert("feasibility_result".to_string(), json!({ PHASE_RESULT_KEY: result.to_value() }));
        input
    }

    #[test]
    fn test_validate_rejects_no_go_feasibility() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Frontend UI components"], 1);

        assert!(agent.validate_input(&input(&issue, Decision::Go)).is_empty());
        let errors = agent.validate_input(&input(&issue, Decision::NoGo));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no-go"));
    }

    #[test]
    fn test_validate_requires_feasibility_result() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let mut input = Payload::new();
        input.insert("issue".to_string(), json!({ "issue_title": "x" }));

        assert_eq!(agent.validate_input(&input), vec!["feasibility_result is required".to_string()]);
    }

    #[test]
    fn test_cache_component_respects_no_redis() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Redis cache layer for hot data"], 3);

        let forbidden = agent.components(&issue, &TechnicalConstraints::default());
        assert_eq!(forbidden.last().unwrap().technology, "In-process LRU cache");

        let allowed = agent.components(&issue, &TechnicalConstraints::default().set("no_redis", false));
        assert_eq!(allowed.last().unwrap().technology, "Redis");
    }

    #[test]
    fn test_adrs_numbered_per_year() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Database schema changes and migrations"], 8);
        let components = agent.components(&issue, &TechnicalConstraints::default());

        let adrs = agent.adrs(&issue, &components);
        let year = Utc::now().year();
        assert_eq!(adrs.len(), 2);
        assert_eq!(adrs[0].id, format!("ADR-{}-1", year));
        assert_eq!(adrs[1].id, format!("ADR-{}-2", year));
    }

    #[test]
    fn test_small_design_has_no_adrs() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Frontend UI components"], 1);
        let components = agent.components(&issue, &TechnicalConstraints::default());

        assert!(agent.adrs(&issue, &components).is_empty());
    }

    #[tokio::test]
    async fn test_run_writes_documents() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Frontend UI components"], 1);

        let output = agent.run(&input(&issue, Decision::Go)).await.unwrap();
        let result = SdlcPhaseResult::from_output(&output).unwrap();

        assert_eq!(result.decision, Decision::Go);
        assert_eq!(result.artifacts.len(), 2);
        assert!(temp.path().join("design").is_dir());
        assert!(output["hld"].as_str().unwrap().contains("Risks Considered"));
        assert!(output["hld"].as_str().unwrap().contains("No redis"));
        assert!(agent.custom_guardrails(&output).is_empty());
    }

    #[test]
    fn test_guardrail_flags_redis_under_no_redis() {
        let temp = TempDir::new().unwrap();
        let agent = DesignAgent::new(ArtifactStore::new(temp.path()));
        let mut output = Payload::new();
        output.insert("hld".to_string(), json!("Cache backed by Redis"));
        output.insert("lld".to_string(), json!("details"));
        output.insert("diagrams".to_string(), json!({ "architecture": "flowchart" }));
        output.insert("constraints_applied".to_string(), json!(["no_redis"]));

        let violations = agent.custom_guardrails(&output);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("Redis"));
    }
}
