//! Policy chains and their configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PolicyResult;
use crate::policy::{Policy, Violation};
use crate::rules::{
    BannedTermsPolicy, NoPlaceholderPolicy, TestsPresentPolicy, TraceabilityPolicy,
    DEFAULT_PLACEHOLDER_MARKERS, DEFAULT_TRACEABILITY_PATTERNS,
};

/// An ordered, enumerable list of policies.
///
/// Every policy in the chain runs; violations are concatenated in chain order.
#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyChain {
    /// An empty chain that accepts every output.
    pub fn new() -> Self {
        Self::default()
    }

    /// All four built-in policies with default settings.
    pub fn standard() -> PolicyResult<Self> {
        Self::from_config(&PolicyChainConfig::standard())
    }

    /// Policies that apply to generated documents: placeholders and banned terms.
    pub fn documentation() -> Self {
        Self::new()
            .with(NoPlaceholderPolicy::default())
            .with(BannedTermsPolicy::default())
    }

    /// Build a chain from configuration.
    pub fn from_config(config: &PolicyChainConfig) -> PolicyResult<Self> {
        let mut chain = Self::new();

        if !config.placeholder_markers.is_empty() {
            chain = chain.with(NoPlaceholderPolicy::new(config.placeholder_markers.iter().cloned()));
        }
        if config.require_traceability {
            chain = chain.with(TraceabilityPolicy::with_patterns(&config.traceability_patterns)?);
        }
        if config.reject_emoji || !config.banned_terms.is_empty() {
            let mut banned = BannedTermsPolicy::new(config.banned_terms.iter().cloned());
            if !config.reject_emoji {
                banned = banned.allow_emoji();
            }
            chain = chain.with(banned);
        }
        if config.require_tests {
            chain = chain.with(TestsPresentPolicy::new()?);
        }

        debug!("Built policy chain: {:?}", chain.names());
        Ok(chain)
    }

    /// Append a policy.
    pub fn with(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// Names of the registered policies, in order.
    pub fn names(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Run every policy against an output.
    pub fn check(&self, output: &Map<String, Value>) -> Vec<Violation> {
        self.policies.iter().flat_map(|p| p.check(output)).collect()
    }
}

impl std::fmt::Debug for PolicyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyChain")
            .field("policies", &self.names())
            .finish()
    }
}

/// Declarative chain configuration, loadable from YAML.
///
/// ```yaml
/// placeholder_markers: [TODO, FIXME]
/// banned_terms: ["lorem ipsum"]
/// reject_emoji: true
/// require_traceability: false
/// require_tests: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyChainConfig {
    pub placeholder_markers: Vec<String>,
    pub banned_terms: Vec<String>,
    pub reject_emoji: bool,
    pub require_traceability: bool,
    pub traceability_patterns: Vec<String>,
    pub require_tests: bool,
}

impl Default for PolicyChainConfig {
    /// No policies enabled. Phase outputs echo the feature request, so document
    /// policies are opted into explicitly.
    fn default() -> Self {
        Self {
            placeholder_markers: Vec::new(),
            banned_terms: Vec::new(),
            reject_emoji: false,
            require_traceability: false,
            traceability_patterns: DEFAULT_TRACEABILITY_PATTERNS.iter().map(|s| s.to_string()).collect(),
            require_tests: false,
        }
    }
}

impl PolicyChainConfig {
    /// Matches [`PolicyChain::documentation`].
    pub fn documentation() -> Self {
        Self {
            placeholder_markers: DEFAULT_PLACEHOLDER_MARKERS.iter().map(|s| s.to_string()).collect(),
            reject_emoji: true,
            ..Self::default()
        }
    }

    /// Configuration enabling all four built-in policies.
    pub fn standard() -> Self {
        Self {
            require_traceability: true,
            require_tests: true,
            ..Self::documentation()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> PolicyResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_chain_has_all_policies() {
        let chain = PolicyChain::standard().unwrap();
        assert_eq!(
            chain.names(),
            vec!["no_placeholder", "traceability", "banned_terms", "tests_present"]
        );
    }

    #[test]
    fn test_documentation_chain() {
        let chain = PolicyChain::documentation();
        assert_eq!(chain.names(), vec!["no_placeholder", "banned_terms"]);

        let clean = json!({ "hld": "Service boundaries are described below." });
        assert!(chain.check(clean.as_object().unwrap()).is_empty());

        let dirty = json!({ "hld": "FIXME", "lld": "done \u{2705}" });
        assert_eq!(chain.check(dirty.as_object().unwrap()).len(), 2);
    }

    #[test]
    fn test_empty_chain_accepts_everything() {
        let chain = PolicyChain::new();
        let output = json!({ "anything": "TODO" });
        assert!(chain.is_empty());
        assert!(chain.check(output.as_object().unwrap()).is_empty());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
placeholder_markers: [TBD]
banned_terms: ["synergy"]
reject_emoji: false
"#;
        let config = PolicyChainConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.placeholder_markers, vec!["TBD"]);
        assert!(!config.require_traceability);

        let chain = PolicyChain::from_config(&config).unwrap();
        let output = json!({ "text": "TBD synergy \u{1F680}" });
        let violations = chain.check(output.as_object().unwrap());
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_config_from_yaml_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("policies.yaml");
        std::fs::write(&path, "require_tests: true\n").unwrap();

        let config = PolicyChainConfig::from_yaml_file(&path).unwrap();
        assert!(config.require_tests);
        assert!(config.placeholder_markers.is_empty());
        assert_eq!(PolicyChain::from_config(&config).unwrap().names(), vec!["tests_present"]);
    }

    #[test]
    fn test_default_config_builds_empty_chain() {
        let chain = PolicyChain::from_config(&PolicyChainConfig::default()).unwrap();
        assert!(chain.is_empty());

        let documentation = PolicyChain::from_config(&PolicyChainConfig::documentation()).unwrap();
        assert_eq!(documentation.names(), PolicyChain::documentation().names());
    }
}
