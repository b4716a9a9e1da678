//! The policy trait and violation type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A guardrail violation reported by a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the policy that produced the violation
    pub policy: String,
    /// Human-readable description
    pub message: String,
    /// Output key where the offending text was found, if known
    pub key: Option<String>,
}

impl Violation {
    pub fn new(policy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            message: message.into(),
            key: None,
        }
    }

    pub fn at_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "[{}] {} (in '{}')", self.policy, self.message, key),
            None => write!(f, "[{}] {}", self.policy, self.message),
        }
    }
}

/// A guardrail over an agent's output map.
///
/// Policies are pure: they inspect the output and report violations, they
/// never modify it.
pub trait Policy: Send + Sync {
    /// Stable policy name, used in violation messages.
    fn name(&self) -> &str;

    /// Check an output map.
    fn check(&self, output: &Map<String, Value>) -> Vec<Violation>;
}

/// Collect every string value in an output map, paired with its top-level key.
///
/// Nested arrays and objects are walked recursively. Object keys themselves
/// are not collected.
pub fn collect_text(output: &Map<String, Value>) -> Vec<(&str, &str)> {
    let mut texts = Vec::new();
    for (key, value) in output {
        walk(key, value, &mut texts);
    }
    texts
}

fn walk<'a>(key: &'a str, value: &'a Value, texts: &mut Vec<(&'a str, &'a str)>) {
    match value {
        Value::String(s) => texts.push((key, s.as_str())),
        Value::Array(items) => {
            for item in items {
                walk(key, item, texts);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                walk(key, nested, texts);
            }
        }
        _ => {}
    }
}
