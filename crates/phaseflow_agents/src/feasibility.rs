//! Feasibility agent: technical assessment, risk identification, effort, and
//! the go / no-go / review decision.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use phaseflow_core::{
    Agent, ArtifactStore, Decision, Likelihood, Payload, Phase, Risk, SdlcAgent, Severity,
    PHASE_RESULT_KEY,
};

use crate::constraints::TechnicalConstraints;
use crate::issue::{validate_issue, Issue, Priority};

/// Effort above which the estimate itself lowers confidence.
const LONG_EFFORT_DAYS: f64 = 20.0;
const HOURS_PER_POINT: f64 = 4.0;
const HOURS_PER_DAY: f64 = 8.0;

/// Technical feasibility against the project's constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFeasibility {
    pub is_feasible: bool,
    pub score: f64,
    pub concerns: Vec<String>,
    pub blockers: Vec<String>,
}

/// Effort estimate derived from story points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortAnalysis {
    pub story_points: u32,
    pub complexity_multiplier: f64,
    pub estimated_hours: f64,
    pub estimated_days: f64,
}

/// Feasibility agent.
pub struct FeasibilityAgent {
    store: ArtifactStore,
}

impl FeasibilityAgent {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub fn assess(&self, issue: &Issue, constraints: &TechnicalConstraints) -> TechnicalFeasibility {
        let text = issue.search_text();
        let mut factors = Vec::new();
        let mut concerns = Vec::new();
        let mut blockers = Vec::new();

        for violation in constraints.violations(&issue.technical_requirements) {
            factors.push(violation.score_factor);
            blockers.push(violation.message);
        }

        if text.contains("refactor") || text.contains("architecture") {
            factors.push(0.6);
            concerns.push("Architectural change touches existing components".to_string());
        } else {
            factors.push(0.9);
        }

        if text.contains("integration") || text.contains("third-party") || text.contains("external") {
            factors.push(0.7);
            concerns.push("Depends on an external integration".to_string());
        } else {
            factors.push(0.9);
        }

        TechnicalFeasibility {
            is_feasible: blockers.is_empty(),
            score: mean(&factors),
            concerns,
            blockers,
        }
    }

    pub fn identify_risks(&self, issue: &Issue, technical: &TechnicalFeasibility) -> Vec<Risk> {
        let mut risks = Vec::new();

        if issue.story_points >= 13 {
            risks.push(
                Risk::new(
                    "technical",
                    Severity::High,
                    format!("High complexity ({} story points)", issue.story_points),
                )
                .with_probability(Likelihood::Medium)
                .with_impact("Delivery slips or quality drops")
                .with_mitigation("Split the work into smaller increments"),
            );
        }

        if !technical.blockers.is_empty() {
            risks.push(
                Risk::new(
                    "constraint_violation",
                    Severity::Critical,
                    format!("Technical constraints violated: {}", technical.blockers.join("; ")),
                )
                .with_probability(Likelihood::High)
                .with_impact("Feature cannot ship as specified")
                .with_mitigation("Redesign the feature without the forbidden capability"),
            );
        }

        if issue.priority == Priority::P0 && issue.story_points >= 8 {
            risks.push(
                Risk::new("schedule", Severity::High, "Urgent priority with a large scope")
                    .with_probability(Likelihood::High)
                    .with_impact("Pressure to cut corners")
                    .with_mitigation("Negotiate scope or add capacity"),
            );
        }

        if issue.acceptance_criteria.len() < 3 {
            risks.push(
                Risk::new("requirements", Severity::Medium, "Too few acceptance criteria")
                    .with_probability(Likelihood::Medium)
                    .with_impact("Ambiguous definition of done")
                    .with_mitigation("Refine acceptance criteria with stakeholders"),
            );
        }

        risks
    }

    pub fn estimate_effort(&self, issue: &Issue, technical: &TechnicalFeasibility) -> EffortAnalysis {
        let multiplier = 1.0 + 0.25 * technical.concerns.len() as f64;
        let hours = issue.story_points as f64 * HOURS_PER_POINT * multiplier;
        EffortAnalysis {
            story_points: issue.story_points,
            complexity_multiplier: multiplier,
            estimated_hours: hours,
            estimated_days: (hours / HOURS_PER_DAY * 10.0).round() / 10.0,
        }
    }

    /// Decide and score. Returns the decision, confidence, and recommendations.
    pub fn decide(
        &self,
        technical: &TechnicalFeasibility,
        risks: &[Risk],
        effort: &EffortAnalysis,
    ) -> (Decision, f64, Vec<String>) {
        let mut factors = vec![technical.score];
        let mut recommendations = Vec::new();

        let critical = risks.iter().filter(|r| r.severity == Severity::Critical).count();
        let high = risks.iter().filter(|r| r.severity == Severity::High).count();

        let decision = if critical > 0 {
            factors.push(0.0);
            for blocker in &technical.blockers {
                recommendations.push(format!("Resolve blocker: {}", blocker));
            }
            recommendations.push("Revisit the requirements with stakeholders".to_string());
            Decision::NoGo
        } else if high >= 3 {
            factors.push(0.5);
            recommendations.push("Hold a risk review with the tech lead before design".to_string());
            Decision::Review
        } else {
            factors.push(if high > 0 { 0.5 } else { 0.9 });
            recommendations.push("Proceed to design".to_string());
            Decision::Go
        };

        for risk in risks.iter().filter(|r| r.severity == Severity::High && !r.mitigation.is_empty()) {
            recommendations.push(format!("Mitigate {} risk: {}", risk.risk_type, risk.mitigation));
        }

        if effort.estimated_days > LONG_EFFORT_DAYS {
            factors.push(0.4);
            recommendations.push(format!(
                "Consider phased delivery; estimate is {} days",
                effort.estimated_days
            ));
        }

        (decision, mean(&factors), recommendations)
    }

    fn render(
        &self,
        issue: &Issue,
        technical: &TechnicalFeasibility,
        risks: &[Risk],
        effort: &EffortAnalysis,
        decision: Decision,
        confidence: f64,
        recommendations: &[String],
    ) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Feasibility Report: {}\n\n", issue.issue_title));
        md.push_str(&format!("**Date:** {}  \n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
        md.push_str(&format!("**Decision:** {}  \n", decision.as_str().to_uppercase()));
        md.push_str(&format!("**Confidence:** {:.0}%\n\n", confidence * 100.0));

        md.push_str("## Technical Feasibility\n\n");
        md.push_str(&format!(
            "- Feasible: {}\n- Score: {:.2}\n",
            if technical.is_feasible { "yes" } else { "no" },
            technical.score
        ));
        for concern in &technical.concerns {
            md.push_str(&format!("- Concern: {}\n", concern));
        }
        for blocker in &technical.blockers {
            md.push_str(&format!("- Blocker: {}\n", blocker));
        }

        md.push_str("\n## Risks\n\n");
        if risks.is_empty() {
            md.push_str("No significant risks identified.\n");
        } else {
            md.push_str("| Type | Severity | Description | Mitigation |\n|------|----------|-------------|------------|\n");
            for risk in risks {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    risk.risk_type, risk.severity, risk.description, risk.mitigation
                ));
            }
        }

        md.push_str("\n## Effort\n\n");
        md.push_str(&format!(
            "- Story points: {}\n- Complexity multiplier: {:.2}\n- Estimated hours: {:.1}\n- Estimated days: {:.1}\n",
            effort.story_points, effort.complexity_multiplier, effort.estimated_hours, effort.estimated_days
        ));

        md.push_str("\n## Recommendations\n\n");
        for recommendation in recommendations {
            md.push_str(&format!("- {}\n", recommendation));
        }
        md
    }
}

#[async_trait]
impl Agent for FeasibilityAgent {
    fn name(&self) -> &str {
        "feasibility"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        validate_issue(input)
    }

    async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
        let issue = Issue::from_input(input)?;
        let constraints: TechnicalConstraints = match input.get("technical_constraints") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => TechnicalConstraints::default(),
        };

        let technical = self.assess(&issue, &constraints);
        let risks = self.identify_risks(&issue, &technical);
        let effort = self.estimate_effort(&issue, &technical);
        let (decision, confidence, recommendations) = self.decide(&technical, &risks, &effort);

        if decision == Decision::NoGo {
            warn!("Feasibility for '{}' is no-go: {:?}", issue.issue_title, technical.blockers);
        } else {
            info!(
                "Feasibility for '{}': {} ({:.2})",
                issue.issue_title, decision, confidence
            );
        }

        let report = self.render(&issue, &technical, &risks, &effort, decision, confidence, &recommendations);
        let path = self.save_artifact(&report, &ArtifactStore::timestamped_name("feasibility_report"))?;

        let next_steps = match decision {
            Decision::NoGo => vec![
                "Address the identified blockers".to_string(),
                "Re-run feasibility analysis".to_string(),
            ],
            Decision::Review => vec![
                "Obtain stakeholder approval".to_string(),
                "Proceed to design after approval".to_string(),
            ],
            _ => vec!["Start the high-level design".to_string()],
        };

        let phase_result = self
            .phase_result(decision, confidence)
            .with_artifact(path.clone())
            .with_recommendations(recommendations)
            .with_risks(risks.clone())
            .with_next_steps(next_steps);

        let mut output = Payload::new();
        output.insert("feasibility_report".to_string(), json!(report));
        output.insert("report_path".to_string(), json!(path));
        output.insert("technical_feasibility".to_string(), serde_json::to_value(&technical)?);
        output.insert("risks".to_string(), serde_json::to_value(&risks)?);
        output.insert("effort_analysis".to_string(), serde_json::to_value(&effort)?);
        output.insert("decision".to_string(), json!(decision));
        output.insert("confidence".to_string(), json!(phase_result.confidence()));
        output.insert(PHASE_RESULT_KEY.to_string(), phase_result.to_value());
        Ok(output)
    }

    fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
        let mut violations = Vec::new();
        if !output.contains_key("decision") {
            violations.push("Feasibility output has no decision".to_string());
        }
        if !output.get("risks").map_or(false, Value::is_array) {
            violations.push("Feasibility output has no risk list".to_string());
        }
        match output.get("confidence").and_then(Value::as_f64) {
            Some(c) if c > 0.0 && c <= 1.0 => {}
            other => violations.push(format!("Confidence out of range: {:?}", other)),
        }
        violations
    }
}

impl SdlcAgent for FeasibilityAgent {
    fn phase(&self) -> Phase {
        Phase::Feasibility
    }

    fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseflow_core::SdlcPhaseResult;
    use tempfile::TempDir;

    fn issue(requirements: &[&str], points: u32, priority: Priority) -> Issue {
        Issue {
            issue_title: "Sample".to_string(),
            issue_body: "Sample body".to_string(),
            story_points: points,
            priority,
            acceptance_criteria: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            technical_requirements: requirements.iter().map(|r| r.to_string()).collect(),
            dependencies: Vec::new(),
        }
    }

    fn input(issue: &Issue, constraints: Value) -> Payload {
        let mut input = Payload::new();
        input.insert("issue".to_string(), serde_json::to_value(issue).unwrap());
        input.insert("technical_constraints".to_string(), constraints);
        input
    }

    #[test]
    fn test_clean_issue_is_go() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Frontend UI components"], 1, Priority::P2);

        let technical = agent.assess(&issue, &TechnicalConstraints::default());
        let risks = agent.identify_risks(&issue, &technical);
        let effort = agent.estimate_effort(&issue, &technical);
        let (decision, confidence, _) = agent.decide(&technical, &risks, &effort);

        assert!(technical.is_feasible);
        assert!(risks.is_empty());
        assert_eq!(decision, Decision::Go);
        assert!((confidence - 0.9).abs() < 1e-9);
        assert_eq!(effort.estimated_hours, 4.0);
    }

    #[test]
    fn test_redis_under_no_redis_is_no_go() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Redis cache layer for hot data"], 2, Priority::P2);

        let technical = agent.assess(&issue, &TechnicalConstraints::default().set("no_redis", true));
        let risks = agent.identify_risks(&issue, &technical);
        let effort = agent.estimate_effort(&issue, &technical);
        let (decision, confidence, recommendations) = agent.decide(&technical, &risks, &effort);

        assert!(!technical.is_feasible);
        assert_eq!(technical.blockers.len(), 1);
        assert!(risks.iter().any(|r| r.severity == Severity::Critical));
        assert_eq!(decision, Decision::NoGo);
        assert!(confidence > 0.0 && confidence < 0.5);
        assert!(recommendations[0].starts_with("Resolve blocker"));
    }

    #[test]
    fn test_many_high_risks_is_review() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let technical = TechnicalFeasibility {
            is_feasible: true,
            score: 0.9,
            concerns: Vec::new(),
            blockers: Vec::new(),
        };
        let risks: Vec<Risk> = (0..3)
            .map(|i| Risk::new("technical", Severity::High, format!("risk {}", i)))
            .collect();
        let effort = EffortAnalysis {
            story_points: 3,
            complexity_multiplier: 1.0,
            estimated_hours: 12.0,
            estimated_days: 1.5,
        };

        let (decision, confidence, _) = agent.decide(&technical, &risks, &effort);
        assert_eq!(decision, Decision::Review);
        assert!((confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_urgent_large_issue_has_schedule_risk() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Application logic changes"], 13, Priority::P0);
        let technical = agent.assess(&issue, &TechnicalConstraints::default());

        let risks = agent.identify_risks(&issue, &technical);
        let types: Vec<&str> = risks.iter().map(|r| r.risk_type.as_str()).collect();
        assert_eq!(types, vec!["technical", "schedule"]);
    }

    #[tokio::test]
    async fn test_run_publishes_report_and_result() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let issue = issue(&["Redis cache layer for hot data"], 2, Priority::P2);

        let output = agent.run(&input(&issue, json!({ "no_redis": true }))).await.unwrap();
        let result = SdlcPhaseResult::from_output(&output).unwrap();

        assert_eq!(result.decision, Decision::NoGo);
        assert_eq!(output["decision"], json!("no-go"));
        assert!(result.artifacts[0].exists());
        assert!(output["technical_feasibility"]["blockers"].as_array().unwrap().len() == 1);
        assert!(agent.custom_guardrails(&output).is_empty());
    }

    #[test]
    fn test_guardrails_reject_missing_fields() {
        let temp = TempDir::new().unwrap();
        let agent = FeasibilityAgent::new(ArtifactStore::new(temp.path()));
        let mut output = Payload::new();
        output.insert("confidence".to_string(), json!(0.0));

        assert_eq!(agent.custom_guardrails(&output).len(), 3);
    }
}
