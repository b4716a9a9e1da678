//! Orchestrator configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use phaseflow_core::{AgentServices, ArtifactStore, DEFAULT_OUTPUT_ROOT};
use phaseflow_llm::LlmConfig;
use phaseflow_policy::{PolicyChain, PolicyChainConfig};

use crate::error::OrchestratorResult;

/// Environment variable overriding `output_root`.
pub const OUTPUT_DIR_ENV: &str = "PHASEFLOW_OUTPUT_DIR";

/// Orchestrator settings, loadable from YAML.
///
/// ```yaml
/// output_root: docs/sdlc_outputs
/// auto_proceed: false
/// policies:
///   banned_terms: [lorem]
/// llm:
///   provider: anthropic
///   timeout_secs: 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Root directory for artifacts. Relative paths resolve against `project_root`.
    pub output_root: PathBuf,
    pub project_root: PathBuf,
    /// Continue past `review` decisions without human approval
    pub auto_proceed: bool,
    pub policies: PolicyChainConfig,
    pub llm: LlmConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            project_root: PathBuf::from("."),
            auto_proceed: false,
            policies: PolicyChainConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn load(path: &Path) -> OrchestratorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!("Loaded orchestrator config from {}", path.display());
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> OrchestratorResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.output_root = PathBuf::from(dir);
        }
        self
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn with_auto_proceed(mut self, auto_proceed: bool) -> Self {
        self.auto_proceed = auto_proceed;
        self
    }

    pub fn resolved_output_root(&self) -> PathBuf {
        if self.output_root.is_absolute() {
            self.output_root.clone()
        } else {
            self.project_root.join(&self.output_root)
        }
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(self.resolved_output_root())
    }

    /// Services for phase agents, with the configured policy chain.
    pub fn services(&self) -> OrchestratorResult<AgentServices> {
        Ok(AgentServices::new(PolicyChain::from_config(&self.policies)?))
    }
}
