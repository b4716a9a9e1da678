//! Final and early-stop report rendering.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use phaseflow_core::{Phase, Risk, SdlcPhaseResult};

use crate::outcome::ExecutionLogEntry;
use crate::request::PhaseResults;
use crate::strategy::OrchestrationMethod;

/// Everything a report is built from.
#[derive(Debug)]
pub struct ReportContext<'a> {
    pub run_id: Uuid,
    pub feature_request: &'a str,
    pub phase_results: &'a PhaseResults,
    pub execution_log: &'a [ExecutionLogEntry],
    pub all_artifacts: &'a [PathBuf],
}

fn field<'v>(output: &'v serde_json::Map<String, Value>, path: &[&str]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(output.get(*first)?, |value, key| value.get(*key))
}

fn text(output: &serde_json::Map<String, Value>, path: &[&str]) -> String {
    match field(output, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

fn count(output: &serde_json::Map<String, Value>, path: &[&str]) -> usize {
    match field(output, path) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

fn execution_table(log: &[ExecutionLogEntry]) -> String {
    let mut md = String::from("| Phase | Status | Decision |\n|-------|--------|----------|\n");
    for entry in log {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            entry.phase,
            entry.status.to_uppercase(),
            entry.decision.map_or("N/A".to_string(), |d| d.as_str().to_uppercase())
        ));
    }
    md
}

fn phase_summary(phase: Phase, output: &serde_json::Map<String, Value>) -> String {
    let mut md = format!("### {}\n\n", phase);
    match phase {
        Phase::Planning => {
            md.push_str(&format!("- Issue: {}\n", text(output, &["issue", "issue_title"])));
            md.push_str(&format!("- Priority: {}\n", text(output, &["issue", "priority"])));
            md.push_str(&format!("- Story points: {}\n", text(output, &["issue", "story_points"])));
            md.push_str(&format!(
                "- Acceptance criteria: {}\n",
                count(output, &["issue", "acceptance_criteria"])
            ));
        }
        Phase::Feasibility => {
            md.push_str(&format!("- Feasible: {}\n", text(output, &["technical_feasibility", "is_feasible"])));
            md.push_str(&format!("- Risks identified: {}\n", count(output, &["risks"])));
            md.push_str(&format!("- Estimated days: {}\n", text(output, &["effort_analysis", "estimated_days"])));
        }
        Phase::Design => {
            md.push_str(&format!("- HLD: `{}`\n", text(output, &["hld_path"])));
            md.push_str(&format!("- LLD: `{}`\n", text(output, &["lld_path"])));
            md.push_str(&format!("- ADRs: {}\n", count(output, &["adrs"])));
            md.push_str(&format!("- Diagrams: {}\n", count(output, &["diagrams"])));
        }
        Phase::Testing => {
            md.push_str(&format!("- Total tests: {}\n", text(output, &["test_pyramid", "total_tests"])));
            for (label, key) in [("Unit", "unit_tests"), ("Integration", "integration_tests"), ("E2E", "e2e_tests")] {
                md.push_str(&format!(
                    "- {}: {} ({}%)\n",
                    label,
                    text(output, &["test_pyramid", key, "count"]),
                    text(output, &["test_pyramid", key, "percentage"])
                ));
            }
            md.push_str(&format!(
                "- Coverage target: {}%\n",
                text(output, &["coverage_requirements", "overall_target"])
            ));
        }
        Phase::Deployment => {
            md.push_str(&format!("- Environment: {}\n", text(output, &["environment"])));
            md.push_str(&format!("- Deployment plan: `{}`\n", text(output, &["deployment_plan_path"])));
            md.push_str(&format!("- Rollback plan: `{}`\n", text(output, &["rollback_plan_path"])));
        }
        Phase::Implementation | Phase::Maintenance => {}
    }

    if let Some(result) = SdlcPhaseResult::from_output(output) {
        md.push_str(&format!(
            "- Decision: {} ({:.0}% confidence)\n",
            result.decision.as_str().to_uppercase(),
            result.confidence() * 100.0
        ));
    }
    md.push('\n');
    md
}

fn risk_register(risks: &[Risk]) -> String {
    if risks.is_empty() {
        return "No risks identified.\n".to_string();
    }
    let mut md = String::from("| Phase | Type | Severity | Description | Mitigation |\n|-------|------|----------|-------------|------------|\n");
    for risk in risks {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            risk.source_phase.map_or("-".to_string(), |p| p.to_string()),
            risk.risk_type,
            risk.severity,
            risk.description,
            if risk.mitigation.is_empty() { "-" } else { risk.mitigation.as_str() }
        ));
    }
    md
}

fn artifact_list(artifacts: &[PathBuf]) -> String {
    let mut md = format!("Total artifacts: {}\n\n", artifacts.len());
    for artifact in artifacts {
        md.push_str(&format!("- `{}`\n", artifact.display()));
    }
    md
}

/// Next steps for a run that ended after `last` phase.
pub fn next_steps(last: Option<Phase>) -> Vec<&'static str> {
    match last {
        Some(Phase::Deployment) | Some(Phase::Maintenance) => vec![
            "Execute the pre-deployment checklist",
            "Deploy to the staging environment",
            "Validate the deployment",
            "Execute the post-deployment checklist",
            "Monitor for 24 hours",
            "Deploy to production once staging is healthy",
        ],
        Some(Phase::Testing) => vec![
            "Implement the planned unit, integration, and E2E tests",
            "Validate coverage above 80%",
            "Fix failing tests",
            "Proceed to the deployment phase",
        ],
        Some(Phase::Design) | Some(Phase::Implementation) => vec![
            "Review the HLD and LLD with the team",
            "Approve the ADRs",
            "Begin implementation test-first",
        ],
        _ => vec![
            "Complete the remaining SDLC phases",
            "Review the artifacts generated so far",
            "Continue with the next phase",
        ],
    }
}

fn lessons_learned(phase_results: &PhaseResults) -> Vec<String> {
    let mut lessons = Vec::new();
    if let Some(feasibility) = phase_results.get(&Phase::Feasibility) {
        let risks = count(feasibility, &["risks"]);
        if risks > 0 {
            lessons.push(format!("{} risks were identified during feasibility; mitigate them early", risks));
        }
    }
    if let Some(design) = phase_results.get(&Phase::Design) {
        let adrs = count(design, &["adrs"]);
        if adrs > 0 {
            lessons.push(format!("{} ADRs document the significant architecture decisions", adrs));
        }
    }
    lessons.push("Running every phase through one pipeline keeps artifacts consistent".to_string());
    lessons
}

/// Report for a run that went through every selected phase.
pub fn render_final_report(
    ctx: &ReportContext<'_>,
    risks: &[Risk],
    recommendations: &[String],
    method: OrchestrationMethod,
) -> String {
    let mut md = String::from("# SDLC Pipeline Execution Report\n\n");
    md.push_str(&format!("**Date:** {}  \n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    md.push_str(&format!("**Run:** {}  \n", ctx.run_id));
    md.push_str(&format!("**Orchestration method:** {}\n\n", method));

    md.push_str("## Feature Request\n\n");
    md.push_str(ctx.feature_request.trim());
    md.push_str("\n\n## Execution Summary\n\n");
    md.push_str(&execution_table(ctx.execution_log));

    md.push_str("\n## Phase Results\n\n");
    for (phase, output) in ctx.phase_results {
        md.push_str(&phase_summary(*phase, output));
    }

    md.push_str("## Risk Register\n\n");
    md.push_str(&risk_register(risks));

    md.push_str("\n## Artifacts\n\n");
    md.push_str(&artifact_list(ctx.all_artifacts));

    md.push_str("\n## Recommendations\n\n");
    for recommendation in recommendations {
        md.push_str(&format!("- {}\n", recommendation));
    }

    md.push_str("\n## Next Steps\n\n");
    let last = ctx.execution_log.last().map(|e| e.phase);
    for (i, step) in next_steps(last).iter().enumerate() {
        md.push_str(&format!("{}. {}\n", i + 1, step));
    }

    md.push_str("\n## Lessons Learned\n\n");
    for lesson in lessons_learned(ctx.phase_results) {
        md.push_str(&format!("- {}\n", lesson));
    }
    md
}

/// Report for a run stopped by a business decision.
pub fn render_early_stop_report(ctx: &ReportContext<'_>, stopped_at: Phase, reason: &str) -> String {
    let mut md = String::from("# SDLC Pipeline Early Stop Report\n\n");
    md.push_str(&format!("**Date:** {}  \n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    md.push_str(&format!("**Run:** {}  \n", ctx.run_id));
    md.push_str(&format!("**Stopped at:** {}\n\n", stopped_at));

    md.push_str("## Feature Request\n\n");
    md.push_str(ctx.feature_request.trim());
    md.push_str("\n\n## Execution Summary\n\n");
    md.push_str(&execution_table(ctx.execution_log));

    md.push_str("\n## Reason for Stop\n\n");
    md.push_str(reason);
    md.push('\n');

    if let Some(result) = ctx.phase_results.get(&stopped_at).and_then(SdlcPhaseResult::from_output) {
        if !result.risks.is_empty() {
            md.push_str("\n## Blocking Risks\n\n");
            md.push_str(&risk_register(&result.risks));
        }
    }

    md.push_str("\n## Artifacts\n\n");
    md.push_str(&artifact_list(ctx.all_artifacts));

    md.push_str(&format!(
        "\n## Recommendations\n\n1. Review the {} report for blockers\n2. Address the identified issues\n3. Re-run the pipeline after the fixes\n",
        stopped_at
    ));
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseflow_core::{Decision, Payload, Severity, PHASE_RESULT_KEY};
    use serde_json::json;

    fn results() -> PhaseResults {
        let mut planning = Payload::new();
        planning.insert(
            "issue".to_string(),
            json!({ "issue_title": "Dark mode", "priority": "P2", "story_points": 1, "acceptance_criteria": ["a", "b"] }),
        );
        planning.insert(
            PHASE_RESULT_KEY.to_string(),
            SdlcPhaseResult::new(Phase::Planning, Decision::Go, 0.85).to_value(),
        );

        let mut feasibility = Payload::new();
        feasibility.insert("risks".to_string(), json!([{ "type": "technical", "severity": "high", "description": "x" }]));
        feasibility.insert(
            PHASE_RESULT_KEY.to_string(),
            SdlcPhaseResult::new(Phase::Feasibility, Decision::NoGo, 0.3).to_value(),
        );

        let mut results = PhaseResults::new();
        results.insert(Phase::Planning, planning);
        results.insert(Phase::Feasibility, feasibility);
        results
    }

    #[test]
    fn test_final_report_sections() {
        let results = results();
        let log = vec![
            ExecutionLogEntry::new(Phase::Planning, "success", Some(Decision::Go)),
            ExecutionLogEntry::new(Phase::Feasibility, "success", Some(Decision::NoGo)),
        ];
        let artifacts = vec![PathBuf::from("out/planning/issue.md")];
        let ctx = ReportContext {
            run_id: Uuid::nil(),
            feature_request: "Add dark mode toggle",
            phase_results: &results,
            execution_log: &log,
            all_artifacts: &artifacts,
        };
        let risks = vec![Risk::new("technical", Severity::High, "Complex").from_phase(Phase::Feasibility)];

        let report = render_final_report(&ctx, &risks, &["Ship it".to_string()], OrchestrationMethod::Heuristic);

        for section in [
            "## Feature Request",
            "## Execution Summary",
            "## Phase Results",
            "## Risk Register",
            "## Artifacts",
            "## Recommendations",
            "## Next Steps",
            "## Lessons Learned",
        ] {
            assert!(report.contains(section), "missing {}", section);
        }
        assert!(report.contains("| feasibility | SUCCESS | NO-GO |"));
        assert!(report.contains("- Issue: Dark mode"));
        assert!(report.contains("**Orchestration method:** heuristic"));
        assert!(report.contains("1 risks were identified"));
        assert!(report.contains("1. Complete the remaining SDLC phases"));
    }

    #[test]
    fn test_early_stop_report() {
        let results = results();
        let log = vec![ExecutionLogEntry::new(Phase::Feasibility, "success", Some(Decision::NoGo))];
        let ctx = ReportContext {
            run_id: Uuid::nil(),
            feature_request: "Cache sessions in Redis",
            phase_results: &results,
            execution_log: &log,
            all_artifacts: &[],
        };

        let report = render_early_stop_report(&ctx, Phase::Feasibility, "Constraint no_redis forbids Redis");
        assert!(report.contains("**Stopped at:** feasibility"));
        assert!(report.contains("Constraint no_redis forbids Redis"));
        assert!(report.contains("Total artifacts: 0"));
    }

    #[test]
    fn test_next_steps_follow_last_phase() {
        assert_eq!(next_steps(Some(Phase::Testing))[3], "Proceed to the deployment phase");
        assert_eq!(next_steps(None)[0], "Complete the remaining SDLC phases");
    }
}
