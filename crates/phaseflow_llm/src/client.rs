//! LLM client trait and the OpenAI/Anthropic adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, LlmResult};

const SYSTEM_PROMPT: &str = "You are a software delivery decision assistant. \
Answer with a single JSON object and nothing else.";

/// Submit a prompt, get the model's text back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> LlmResult<String>;
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-5-mini",
            LlmProvider::Anthropic => "claude-sonnet-4.5",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

/// LLM settings. API keys are never part of configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether LLM-assisted decisions are attempted at all
    pub enabled: bool,
    /// `openai` or `anthropic`; detected from available keys when unset
    pub provider: Option<String>,
    /// Model name; `PHASEFLOW_LLM_MODEL` takes precedence
    pub model: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            model: None,
            timeout_secs: 60,
        }
    }
}

/// LLM adapter that handles API calls
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> LlmResult<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Create an LLM adapter from environment variables
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    pub fn from_env() -> LlmResult<Self> {
        Self::from_config(&LlmConfig::default())
    }

    /// Create an adapter from settings, reading the API key from the environment.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        if !config.enabled {
            return Err(LlmError::NotConfigured);
        }

        let model = std::env::var("PHASEFLOW_LLM_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| config.model.clone());

        let candidates = match &config.provider {
            Some(name) => vec![name.parse::<LlmProvider>()?],
            None => vec![LlmProvider::OpenAI, LlmProvider::Anthropic],
        };

        for provider in candidates {
            if let Some(api_key) = std::env::var(provider.api_key_var()).ok().filter(|k| !k.is_empty()) {
                debug!("Using {} for LLM-assisted decisions", provider.as_str());
                return Self::new(provider, api_key, model)
                    .with_timeout(Duration::from_secs(config.timeout_secs));
            }
        }

        Err(LlmError::NotConfigured)
    }

    /// Get the current provider
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    // OpenAI chat completion
    async fn complete_openai(&self, prompt: &str) -> LlmResult<String> {
        let url = "https://api.openai.com/v1/chat/completions";

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_completion_tokens: Some(2048),
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "OpenAI".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let result: OpenAIResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse("OpenAI".to_string()))
    }

    // Anthropic messages API
    async fn complete_anthropic(&self, prompt: &str) -> LlmResult<String> {
        let url = "https://api.anthropic.com/v1/messages";

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 2048,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "Anthropic".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let result: AnthropicResponse = response.json().await?;
        result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse("Anthropic".to_string()))
    }
}

#[async_trait]
impl LlmClient for LlmAdapter {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        debug!("Submitting {} char prompt to {}", prompt.len(), self.model);
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(prompt).await,
            LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
        }
    }
}

impl std::fmt::Debug for LlmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAdapter")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish()
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let openai = LlmAdapter::new(LlmProvider::OpenAI, "key".to_string(), None);
        assert_eq!(openai.model(), "gpt-5-mini");

        let anthropic = LlmAdapter::new(
            LlmProvider::Anthropic,
            "key".to_string(),
            Some("custom-model".to_string()),
        );
        assert_eq!(anthropic.model(), "custom-model");
        assert_eq!(anthropic.provider(), LlmProvider::Anthropic);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!(matches!(
            "cohere".parse::<LlmProvider>(),
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_disabled_config_is_not_configured() {
        let config = LlmConfig {
            enabled: false,
            ..LlmConfig::default()
        };
        assert!(matches!(LlmAdapter::from_config(&config), Err(LlmError::NotConfigured)));
    }

    #[test]
    fn test_unknown_provider_in_config() {
        let config = LlmConfig {
            provider: Some("cohere".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmAdapter::from_config(&config),
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_client_round_trip() {
        let mut mock = MockLlmClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|prompt| Ok(format!("echo: {}", prompt)));

        let client: &dyn LlmClient = &mock;
        assert_eq!(client.complete("hi").await.unwrap(), "echo: hi");
    }
}
