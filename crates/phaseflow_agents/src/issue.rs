//! The planning issue shared by every downstream phase, plus input helpers.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use phaseflow_core::{Payload, SdlcPhaseResult};

/// Issue priority, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::P0 => "critical",
            Priority::P1 => "high",
            Priority::P2 => "medium",
            Priority::P3 => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A planned unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_title: String,
    #[serde(default)]
    pub issue_body: String,
    pub story_points: u32,
    pub priority: Priority,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub technical_requirements: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Issue {
    /// Read the issue from an agent input.
    pub fn from_input(input: &Payload) -> anyhow::Result<Self> {
        let value = input.get("issue").cloned().context("input has no issue")?;
        serde_json::from_value(value).context("issue is malformed")
    }

    /// Lowercased title, body, and requirements, for keyword checks.
    pub fn search_text(&self) -> String {
        let mut text = format!("{}\n{}", self.issue_title, self.issue_body);
        for requirement in &self.technical_requirements {
            text.push('\n');
            text.push_str(requirement);
        }
        text.to_lowercase()
    }

    pub fn requires(&self, keyword: &str) -> bool {
        self.technical_requirements
            .iter()
            .any(|r| r.to_lowercase().contains(keyword))
    }
}

/// Lowercased words of `text`, split on anything that is not alphanumeric.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

pub(crate) fn mentions_any(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|w| keywords.contains(&w.as_str()))
}

/// A nested object in the input.
pub(crate) fn object<'a>(input: &'a Payload, key: &str) -> Option<&'a Payload> {
    input.get(key).and_then(Value::as_object)
}

/// A non-blank string in the input.
pub(crate) fn text<'a>(input: &'a Payload, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Validation messages for a missing or incomplete `issue`.
pub(crate) fn validate_issue(input: &Payload) -> Vec<String> {
    match object(input, "issue") {
        None => vec!["issue is required".to_string()],
        Some(issue) if text(issue, "issue_title").is_none() => {
            vec!["issue.issue_title is required".to_string()]
        }
        Some(_) => Vec::new(),
    }
}

/// The phase result inside a prior phase's output stored at `key`.
pub(crate) fn prior_phase_result(input: &Payload, key: &str) -> Result<SdlcPhaseResult, String> {
    let output = object(input, key).ok_or_else(|| format!("{} is required", key))?;
    SdlcPhaseResult::from_output(output).ok_or_else(|| format!("{} has no phase_result", key))
}
