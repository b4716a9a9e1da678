//! Built-in guardrail policies.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{PolicyError, PolicyResult};
use crate::policy::{collect_text, Policy, Violation};

/// Markers that flag unfinished work.
pub const DEFAULT_PLACEHOLDER_MARKERS: &[&str] = &["TODO", "FIXME", "XXX", "HACK"];

/// Reference formats accepted as traceability links.
pub const DEFAULT_TRACEABILITY_PATTERNS: &[&str] =
    &[r"REQ-[A-Z]+-\d+", r"SPEC-[A-Z]+-\d+", r"ADR-\d{4}-\d+"];

const CODE_PATTERNS: &[&str] = &[
    r"(?m)^\s*(pub\s+)?(async\s+)?fn\s+\w+",
    r"(?m)^\s*def\s+\w+\s*\(",
    r"(?m)^\s*class\s+\w+",
    r"(?m)^\s*(import|use)\s+[\w:.]+",
];

const TEST_PATTERNS: &[&str] = &[
    r"#\[(tokio::)?test\]",
    r"(?m)^\s*def\s+test_\w+",
    r"(?m)^\s*class\s+Test\w*",
    r"@pytest",
    r"\bassert(_eq|_ne)?!?\s*[\(\s]",
];

/// Rejects outputs containing unfinished-work markers.
///
/// Markers only match as whole words, so `TODOS` or `HACKATHON` pass.
#[derive(Debug, Clone)]
pub struct NoPlaceholderPolicy {
    markers: Vec<String>,
}

impl NoPlaceholderPolicy {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    fn find_marker(&self, text: &str) -> Option<&str> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .find_map(|word| self.markers.iter().find(|m| m.as_str() == word))
            .map(|m| m.as_str())
    }
}

impl Default for NoPlaceholderPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_MARKERS.iter().copied())
    }
}

impl Policy for NoPlaceholderPolicy {
    fn name(&self) -> &str {
        "no_placeholder"
    }

    fn check(&self, output: &Map<String, Value>) -> Vec<Violation> {
        collect_text(output)
            .into_iter()
            .filter_map(|(key, text)| {
                self.find_marker(text).map(|marker| {
                    Violation::new(self.name(), format!("Placeholder marker '{}' found", marker))
                        .at_key(key)
                })
            })
            .collect()
    }
}

/// Requires at least one traceability reference somewhere in the output.
#[derive(Debug, Clone)]
pub struct TraceabilityPolicy {
    patterns: Vec<Regex>,
}

impl TraceabilityPolicy {
    /// Build from the default reference formats.
    pub fn new() -> PolicyResult<Self> {
        Self::with_patterns(DEFAULT_TRACEABILITY_PATTERNS.iter().copied())
    }

    /// Build from custom reference patterns.
    pub fn with_patterns(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> PolicyResult<Self> {
        let patterns = compile_all("traceability", patterns)?;
        if patterns.is_empty() {
            return Err(PolicyError::InvalidConfiguration(
                "traceability policy needs at least one pattern".to_string(),
            ));
        }
        Ok(Self { patterns })
    }
}

impl Policy for TraceabilityPolicy {
    fn name(&self) -> &str {
        "traceability"
    }

    fn check(&self, output: &Map<String, Value>) -> Vec<Violation> {
        let traced = collect_text(output)
            .into_iter()
            .any(|(_, text)| self.patterns.iter().any(|re| re.is_match(text)));

        if traced {
            Vec::new()
        } else {
            vec![Violation::new(
                self.name(),
                "No requirement, spec, or ADR reference found",
            )]
        }
    }
}

/// Rejects configured terms (case-insensitive) and emoji pictographs.
#[derive(Debug, Clone, Default)]
pub struct BannedTermsPolicy {
    terms: Vec<String>,
    reject_emoji: bool,
}

impl BannedTermsPolicy {
    pub fn new(terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            terms: terms.into_iter().map(|t| t.into().to_lowercase()).collect(),
            reject_emoji: true,
        }
    }

    pub fn allow_emoji(mut self) -> Self {
        self.reject_emoji = false;
        self
    }
}

impl Policy for BannedTermsPolicy {
    fn name(&self) -> &str {
        "banned_terms"
    }

    fn check(&self, output: &Map<String, Value>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (key, text) in collect_text(output) {
            let lowered = text.to_lowercase();
            for term in self.terms.iter().filter(|t| lowered.contains(t.as_str())) {
                violations.push(
                    Violation::new(self.name(), format!("Banned term '{}' found", term)).at_key(key),
                );
            }
            if self.reject_emoji && text.chars().any(is_emoji) {
                violations.push(Violation::new(self.name(), "Emoji found").at_key(key));
            }
        }
        violations
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F
    )
}

/// If any value looks like source code, some value must look like a test.
#[derive(Debug, Clone)]
pub struct TestsPresentPolicy {
    code: Vec<Regex>,
    tests: Vec<Regex>,
}

impl TestsPresentPolicy {
    pub fn new() -> PolicyResult<Self> {
        Ok(Self {
            code: compile_all("tests_present", CODE_PATTERNS.iter().copied())?,
            tests: compile_all("tests_present", TEST_PATTERNS.iter().copied())?,
        })
    }
}

impl Policy for TestsPresentPolicy {
    fn name(&self) -> &str {
        "tests_present"
    }

    fn check(&self, output: &Map<String, Value>) -> Vec<Violation> {
        let texts = collect_text(output);
        let code_key = texts
            .iter()
            .find(|(_, text)| self.code.iter().any(|re| re.is_match(text)))
            .map(|(key, _)| *key);

        let Some(code_key) = code_key else {
            return Vec::new();
        };

        let has_tests = texts
            .iter()
            .any(|(_, text)| self.tests.iter().any(|re| re.is_match(text)));

        if has_tests {
            Vec::new()
        } else {
            vec![Violation::new(self.name(), "Code produced without accompanying tests").at_key(code_key)]
        }
    }
}

fn compile_all(
    policy: &str,
    patterns: impl IntoIterator<Item = impl AsRef<str>>,
) -> PolicyResult<Vec<Regex>> {
    patterns
        .into_iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|e| PolicyError::InvalidPattern {
                policy: policy.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_placeholder_detected() {
        let policy = NoPlaceholderPolicy::default();
        let violations = policy.check(&map(json!({ "hld": "Cache layer: TODO decide" })));

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].key.as_deref(), Some("hld"));
        assert!(violations[0].message.contains("TODO"));
    }

    #[test]
    fn test_placeholder_whole_word_only() {
        let policy = NoPlaceholderPolicy::default();
        let output = map(json!({ "notes": "Todos app for the HACKATHON" }));

        assert!(policy.check(&output).is_empty());
    }

    #[test]
    fn test_traceability_requires_reference() {
        let policy = TraceabilityPolicy::new().unwrap();

        assert_eq!(policy.check(&map(json!({ "body": "no refs" }))).len(), 1);
        assert!(policy.check(&map(json!({ "body": "Implements REQ-AUTH-12" }))).is_empty());
        assert!(policy.check(&map(json!({ "adrs": ["ADR-2024-3"] }))).is_empty());
    }

    #[test]
    fn test_traceability_rejects_bad_pattern() {
        let err = TraceabilityPolicy::with_patterns(["("]).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_banned_terms_case_insensitive() {
        let policy = BannedTermsPolicy::new(["lorem ipsum"]);
        let violations = policy.check(&map(json!({ "text": "Lorem Ipsum dolor" })));

        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_banned_terms_emoji() {
        let policy = BannedTermsPolicy::new(Vec::<String>::new());
        assert_eq!(policy.check(&map(json!({ "text": "Shipped \u{1F680}" }))).len(), 1);

        let relaxed = BannedTermsPolicy::new(Vec::<String>::new()).allow_emoji();
        assert!(relaxed.check(&map(json!({ "text": "Shipped \u{1F680}" }))).is_empty());
    }

    #[test]
    fn test_tests_present() {
        let policy = TestsPresentPolicy::new().unwrap();

        let code_only = map(json!({ "code": "fn handler() {}\n" }));
        assert_eq!(policy.check(&code_only).len(), 1);

        let with_tests = map(json!({
            "code": "fn handler() {}\n",
            "tests": "#[test]\nfn handles() { assert_eq!(1, 1); }"
        }));
        assert!(policy.check(&with_tests).is_empty());

        let prose = map(json!({ "summary": "Define the handler contract." }));
        assert!(policy.check(&prose).is_empty());
    }
}
