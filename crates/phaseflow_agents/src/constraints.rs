//! Forbidden-capability flags checked during feasibility.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flags that are on unless explicitly turned off.
const DEFAULT_FLAGS: &[&str] = &["no_redis", "no_email"];

struct Capability {
    flag: &'static str,
    label: &'static str,
    keywords: &'static [&'static str],
    score_factor: f64,
}

const KNOWN_CAPABILITIES: &[Capability] = &[
    Capability {
        flag: "no_redis",
        label: "Redis",
        keywords: &["redis"],
        score_factor: 0.0,
    },
    Capability {
        flag: "no_email",
        label: "email delivery",
        keywords: &["email", "smtp"],
        score_factor: 0.3,
    },
];

/// A requirement that needs a forbidden capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub flag: String,
    pub requirement: String,
    pub message: String,
    /// Contribution to the technical feasibility score.
    pub score_factor: f64,
}

/// Map of `no_<capability>` flags.
///
/// `no_redis` and `no_email` count as enabled when absent. Any other
/// `no_<capability>` flag forbids requirements mentioning `<capability>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicalConstraints(BTreeMap<String, bool>);

impl TechnicalConstraints {
    pub fn set(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.0.insert(flag.into(), enabled);
        self
    }

    pub fn forbids(&self, flag: &str) -> bool {
        self.0
            .get(flag)
            .copied()
            .unwrap_or_else(|| DEFAULT_FLAGS.contains(&flag))
    }

    /// Every flag currently in force, sorted.
    pub fn enabled_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = DEFAULT_FLAGS
            .iter()
            .map(|f| f.to_string())
            .chain(self.0.keys().cloned())
            .filter(|f| self.forbids(f))
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }

    /// The explicit flag map, with defaults filled in.
    pub fn resolved(&self) -> BTreeMap<String, bool> {
        let mut map = self.0.clone();
        for flag in DEFAULT_FLAGS {
            map.entry(flag.to_string()).or_insert(true);
        }
        map
    }

    /// Requirements that conflict with an enabled flag.
    pub fn violations(&self, requirements: &[String]) -> Vec<ConstraintViolation> {
        let mut found = Vec::new();
        for flag in self.enabled_flags() {
            let (label, keywords, score_factor) = match KNOWN_CAPABILITIES.iter().find(|c| c.flag == flag) {
                Some(c) => (c.label.to_string(), c.keywords.iter().map(|k| k.to_string()).collect(), c.score_factor),
                None => match flag.strip_prefix("no_") {
                    Some(capability) if !capability.is_empty() => {
                        let keyword = capability.replace('_', " ");
                        (keyword.clone(), vec![keyword], 0.0)
                    }
                    _ => continue,
                },
            };

            for requirement in requirements {
                let lowered = requirement.to_lowercase();
                if keywords.iter().any(|k: &String| lowered.contains(k.as_str())) {
                    found.push(ConstraintViolation {
                        flag: flag.clone(),
                        requirement: requirement.clone(),
                        message: format!(
                            "Requirement '{}' needs {} but constraint {} forbids it",
                            requirement, label, flag
                        ),
                        score_factor,
                    });
                }
            }
        }
        found
    }
}

impl FromIterator<(String, bool)> for TechnicalConstraints {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
