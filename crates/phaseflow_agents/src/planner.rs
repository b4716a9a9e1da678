//! Planning agent: turns a free-form feature request into a sized issue.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use phaseflow_core::{Agent, ArtifactStore, Decision, Payload, Phase, Risk, SdlcAgent, Severity, PHASE_RESULT_KEY};

use crate::issue::{mentions_any, text, words, Issue, Priority};

const TITLE_LIMIT: usize = 60;

const BASE_CRITERIA: &[&str] = &[
    "Feature behaves as described in the request",
    "Invalid input is rejected with a clear error message",
    "Unit tests cover the new behavior",
    "User-facing documentation is updated",
    "Existing functionality shows no regressions",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "integration",
    "migration",
    "refactor",
    "architecture",
    "security",
    "performance",
    "realtime",
    "distributed",
];

/// Planning agent.
pub struct PlannerAgent {
    store: ArtifactStore,
}

impl PlannerAgent {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Build an issue from a feature request.
    pub fn plan(&self, request: &str, project_context: &str) -> Issue {
        let w = words(request);
        let acceptance_criteria = acceptance_criteria(&w);
        let technical_requirements = technical_requirements(&w);
        let dependencies = dependencies(&technical_requirements);
        let story_points = story_points(request, &w, acceptance_criteria.len());
        let priority = priority(request, &w);

        let mut issue_body = request.trim().to_string();
        if !project_context.trim().is_empty() {
            issue_body.push_str("\n\nProject context: ");
            issue_body.push_str(project_context.trim());
        }

        Issue {
            issue_title: title(request),
            issue_body,
            story_points,
            priority,
            acceptance_criteria,
            technical_requirements,
            dependencies,
        }
    }

    fn render(&self, issue: &Issue) -> String {
        let mut md = String::new();
        md.push_str(&format!("# {}\n\n", issue.issue_title));
        md.push_str(&format!(
            "**Priority:** {} ({})  \n**Story points:** {}  \n**Created:** {}\n\n",
            issue.priority,
            issue.priority.label(),
            issue.story_points,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str("## Description\n\n");
        md.push_str(&issue.issue_body);
        md.push_str("\n\n## Acceptance Criteria\n\n");
        for criterion in &issue.acceptance_criteria {
            md.push_str(&format!("- [ ] {}\n", criterion));
        }
        md.push_str("\n## Technical Requirements\n\n");
        for requirement in &issue.technical_requirements {
            md.push_str(&format!("- {}\n", requirement));
        }
        if !issue.dependencies.is_empty() {
            md.push_str("\n## Dependencies\n\n");
            for dependency in &issue.dependencies {
                md.push_str(&format!("- {}\n", dependency));
            }
        }
        md
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        if text(input, "feature_request").is_none() {
            vec!["feature_request is required".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
        let request = text(input, "feature_request").unwrap_or_default();
        let project_context = text(input, "project_context").unwrap_or_default();

        let issue = self.plan(request, project_context);
        info!(
            "Planned issue '{}' ({} points, {})",
            issue.issue_title, issue.story_points, issue.priority
        );

        let path = self.save_artifact(&self.render(&issue), &ArtifactStore::timestamped_name("issue"))?;

        let mut recommendations = vec!["Review acceptance criteria with stakeholders".to_string()];
        let mut risks = Vec::new();
        if issue.story_points >= 13 {
            recommendations.push("Split the issue into smaller stories before design".to_string());
            risks.push(
                Risk::new("scope", Severity::Medium, format!("Issue is large ({} story points)", issue.story_points))
                    .with_mitigation("Split into independently deliverable stories"),
            );
        }

        let phase_result = self
            .phase_result(Decision::Go, 0.85)
            .with_artifact(path.clone())
            .with_recommendations(recommendations)
            .with_risks(risks)
            .with_next_steps(vec!["Run feasibility analysis".to_string()]);

        let mut output = Payload::new();
        output.insert("issue".to_string(), serde_json::to_value(&issue)?);
        output.insert("issue_path".to_string(), json!(path));
        output.insert("story_points".to_string(), json!(issue.story_points));
        output.insert("priority".to_string(), json!(issue.priority));
        output.insert(PHASE_RESULT_KEY.to_string(), phase_result.to_value());
        Ok(output)
    }

    fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
        let mut violations = Vec::new();
        let issue = output.get("issue").cloned().unwrap_or(Value::Null);

        if issue["issue_title"].as_str().map_or(true, |t| t.trim().is_empty()) {
            violations.push("Issue title is empty".to_string());
        }
        if issue["issue_body"].as_str().map_or(true, |b| b.trim().is_empty()) {
            violations.push("Issue body is empty".to_string());
        }
        if issue["acceptance_criteria"].as_array().map_or(true, |c| c.is_empty()) {
            violations.push("Issue has no acceptance criteria".to_string());
        }
        if issue["story_points"].as_u64().unwrap_or(0) == 0 {
            violations.push("Issue has no story points".to_string());
        }
        violations
    }
}

impl SdlcAgent for PlannerAgent {
    fn phase(&self) -> Phase {
        Phase::Planning
    }

    fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }
}

/// First non-empty line, truncated to 60 characters.
fn title(request: &str) -> String {
    let first = request
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_start_matches('#')
        .trim();

    if first.chars().count() > TITLE_LIMIT {
        let cut: String = first.chars().take(TITLE_LIMIT - 3).collect();
        format!("{}...", cut.trim_end())
    } else {
        first.to_string()
    }
}

fn acceptance_criteria(w: &[String]) -> Vec<String> {
    let mut criteria: Vec<String> = BASE_CRITERIA.iter().map(|c| c.to_string()).collect();

    if mentions_any(w, &["api", "endpoint", "endpoints", "rest"]) {
        criteria.push("API endpoints return documented status codes".to_string());
        criteria.push("API contract is covered by integration tests".to_string());
    }
    if mentions_any(w, &["auth", "authentication", "login", "permission", "permissions"]) {
        criteria.push("Only authorized users can access the feature".to_string());
        criteria.push("Failed authentication attempts are logged".to_string());
    }
    if mentions_any(w, &["ui", "page", "screen", "frontend"]) {
        criteria.push("UI works on desktop and mobile viewports".to_string());
    }
    criteria
}

fn technical_requirements(w: &[String]) -> Vec<String> {
    let checks: &[(&[&str], &str)] = &[
        (&["api", "endpoint", "endpoints", "backend", "rest", "service"], "Backend API endpoint with request validation"),
        (&["ui", "frontend", "page", "screen", "toggle", "button", "form"], "Frontend UI components"),
        (&["database", "model", "schema", "persist", "table", "storage"], "Database schema changes and migrations"),
        (&["auth", "authentication", "login", "permission", "permissions", "sso"], "Authentication and authorization checks"),
        (&["redis", "cache", "caching", "cached"], "Redis cache layer for hot data"),
        (&["email", "emails", "smtp", "mail"], "Email delivery via SMTP"),
    ];

    let requirements: Vec<String> = checks
        .iter()
        .filter(|(keywords, _)| mentions_any(w, keywords))
        .map(|(_, requirement)| requirement.to_string())
        .collect();

    if requirements.is_empty() {
        vec!["Application logic changes".to_string()]
    } else {
        requirements
    }
}

fn dependencies(requirements: &[String]) -> Vec<String> {
    let map: &[(&str, &str)] = &[
        ("database", "Database migration tooling"),
        ("redis", "Redis server"),
        ("smtp", "SMTP relay"),
        ("authentication", "Identity provider"),
    ];

    map.iter()
        .filter(|(needle, _)| requirements.iter().any(|r| r.to_lowercase().contains(needle)))
        .map(|(_, dependency)| dependency.to_string())
        .collect()
}

/// Fibonacci story points from length, criteria count, and complexity keywords.
fn story_points(request: &str, w: &[String], criteria_count: usize) -> u32 {
    let mut score = match request.len() {
        n if n > 500 => 3,
        n if n > 200 => 2,
        _ => 1,
    };
    score += match criteria_count {
        n if n > 10 => 5,
        n if n > 5 => 3,
        _ => 1,
    };
    score += 2 * COMPLEX_KEYWORDS
        .iter()
        .filter(|k| w.iter().any(|word| word.as_str() == **k))
        .count() as u32;

    match score {
        0..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        7..=9 => 5,
        10..=13 => 8,
        14..=18 => 13,
        _ => 21,
    }
}

fn priority(request: &str, w: &[String]) -> Priority {
    let lower = request.to_lowercase();
    if mentions_any(w, &["critical", "urgent", "outage", "security", "vulnerability"]) {
        Priority::P0
    } else if mentions_any(w, &["important", "customer", "customers", "revenue"]) || lower.contains("high priority") {
        Priority::P1
    } else if lower.contains("nice to have") || mentions_any(w, &["minor", "cosmetic"]) {
        Priority::P3
    } else {
        Priority::P2
    }
}
