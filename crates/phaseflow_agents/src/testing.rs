//! Testing agent: test cases, the test pyramid, and coverage targets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use phaseflow_core::{Agent, ArtifactStore, Decision, Payload, Phase, SdlcAgent, PHASE_RESULT_KEY};

use crate::issue::{mentions_any, prior_phase_result, validate_issue, words, Issue};

/// Unit tests every plan carries regardless of the issue.
const BASELINE_UNIT_TESTS: &[&str] = &["Input boundaries", "Default configuration", "Error propagation"];
const UNIT_SHARE_TARGET: f64 = 60.0;
const OVERALL_COVERAGE_TARGET: u32 = 80;

const E2E_KEYWORDS: &[&str] = &["ui", "page", "screen", "click", "toggle", "browser", "frontend", "display"];
const INTEGRATION_KEYWORDS: &[&str] = &[
    "api", "endpoint", "database", "db", "integration", "external", "persist", "cache", "email", "smtp", "auth",
];

/// Where a test sits in the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestLevel {
    Unit,
    Integration,
    E2e,
}

impl TestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestLevel::Unit => "unit",
            TestLevel::Integration => "integration",
            TestLevel::E2e => "e2e",
        }
    }

    /// Classify a criterion or requirement by its wording.
    pub fn classify(text: &str) -> Self {
        let w = words(text);
        if mentions_any(&w, E2E_KEYWORDS) {
            TestLevel::E2e
        } else if mentions_any(&w, INTEGRATION_KEYWORDS) {
            TestLevel::Integration
        } else {
            TestLevel::Unit
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub level: TestLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelShare {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPyramid {
    pub total_tests: usize,
    pub unit_tests: LevelShare,
    pub integration_tests: LevelShare,
    pub e2e_tests: LevelShare,
}

impl TestPyramid {
    pub fn from_cases(cases: &[TestCase]) -> Self {
        let total = cases.len();
        let share = |level: TestLevel| {
            let count = cases.iter().filter(|c| c.level == level).count();
            let percentage = if total == 0 {
                0.0
            } else {
                (count as f64 * 1000.0 / total as f64).round() / 10.0
            };
            LevelShare { count, percentage }
        };
        Self {
            total_tests: total,
            unit_tests: share(TestLevel::Unit),
            integration_tests: share(TestLevel::Integration),
            e2e_tests: share(TestLevel::E2e),
        }
    }
}

/// Testing agent.
pub struct TestingAgent {
    store: ArtifactStore,
}

impl TestingAgent {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub fn test_cases(&self, issue: &Issue) -> Vec<TestCase> {
        let mut planned: Vec<(String, TestLevel)> = Vec::new();

        for criterion in &issue.acceptance_criteria {
            planned.push((format!("Verify: {}", criterion), TestLevel::classify(criterion)));
        }

        for requirement in &issue.technical_requirements {
            planned.push((format!("{}: happy path", requirement), TestLevel::Unit));
            planned.push((format!("{}: error path", requirement), TestLevel::Unit));
            match TestLevel::classify(requirement) {
                TestLevel::Unit => {}
                level => planned.push((format!("{}: wired end to end", requirement), level)),
            }
        }

        for title in BASELINE_UNIT_TESTS {
            planned.push((title.to_string(), TestLevel::Unit));
        }

        planned
            .into_iter()
            .enumerate()
            .map(|(i, (title, level))| TestCase {
                id: format!("TC-{:03}", i + 1),
                title,
                level,
            })
            .collect()
    }

    fn render(&self, issue: &Issue, cases: &[TestCase], pyramid: &TestPyramid) -> String {
        let mut md = format!("# Test Plan: {}\n\n", issue.issue_title);
        md.push_str("## Test Pyramid\n\n| Level | Count | Share |\n|-------|-------|-------|\n");
        for (level, share) in [
            ("Unit", pyramid.unit_tests),
            ("Integration", pyramid.integration_tests),
            ("E2E", pyramid.e2e_tests),
        ] {
            md.push_str(&format!("| {} | {} | {:.1}% |\n", level, share.count, share.percentage));
        }
        md.push_str(&format!("\n**Total:** {}\n\n", pyramid.total_tests));

        md.push_str("## Test Cases\n\n");
        for case in cases {
            md.push_str(&format!("- {} [{}] {}\n", case.id, case.level.as_str(), case.title));
        }

        md.push_str(&format!(
            "\n## Coverage\n\n- Overall line coverage target: {}%\n- Changed code must be covered by at least one test\n",
            OVERALL_COVERAGE_TARGET
        ));
        md
    }
}

#[async_trait]
impl Agent for TestingAgent {
    fn name(&self) -> &str {
        "testing"
    }

    fn validate_input(&self, input: &Payload) -> Vec<String> {
        let mut errors = validate_issue(input);
        if let Err(e) = prior_phase_result(input, "design_result") {
            errors.push(e);
        }
        errors
    }

    async fn run(&self, input: &Payload) -> anyhow::Result<Payload> {
        let issue = Issue::from_input(input)?;
        let cases = self.test_cases(&issue);
        let pyramid = TestPyramid::from_cases(&cases);

        let path = self.save_artifact(
            &self.render(&issue, &cases, &pyramid),
            &ArtifactStore::timestamped_name("test_plan"),
        )?;

        let balanced = pyramid.unit_tests.percentage >= UNIT_SHARE_TARGET;
        info!(
            "Planned {} tests for '{}' ({:.1}% unit)",
            pyramid.total_tests, issue.issue_title, pyramid.unit_tests.percentage
        );

        let (decision, confidence, recommendations) = if balanced {
            (Decision::Go, 0.85, vec!["Automate the planned tests in CI".to_string()])
        } else {
            (
                Decision::Review,
                0.6,
                vec![format!(
                    "Rebalance toward unit tests; unit share is {:.1}%, target {}%",
                    pyramid.unit_tests.percentage, UNIT_SHARE_TARGET
                )],
            )
        };

        let phase_result = self
            .phase_result(decision, confidence)
            .with_artifact(path.clone())
            .with_recommendations(recommendations)
            .with_next_steps(vec!["Plan the deployment".to_string()]);

        let mut output = Payload::new();
        output.insert("test_plan_path".to_string(), json!(path));
        output.insert("test_cases".to_string(), serde_json::to_value(&cases)?);
        output.insert("test_pyramid".to_string(), serde_json::to_value(&pyramid)?);
        output.insert(
            "coverage_requirements".to_string(),
            json!({ "overall_target": OVERALL_COVERAGE_TARGET, "changed_code": "covered" }),
        );
        output.insert("artifacts".to_string(), json!([path]));
        output.insert(PHASE_RESULT_KEY.to_string(), phase_result.to_value());
        Ok(output)
    }

    fn custom_guardrails(&self, output: &Payload) -> Vec<String> {
        let total = output
            .get("test_pyramid")
            .and_then(|p| p.get("total_tests"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if total == 0 {
            vec!["Test plan contains no tests".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl SdlcAgent for TestingAgent {
    fn phase(&self) -> Phase {
        Phase::Testing
    }

    fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }
}
