// Chat-completion client for the supported AI providers


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::DeckError;
use crate::config::AiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Xai,
    OpenRouter,
}

impl Provider {
    /// Environment variable holding the provider's API key
    #[inline]
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Xai => "XAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    #[inline]
    pub fn endpoint(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::Xai => "https://api.x.ai/v1/chat/completions",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    #[inline]
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4",
            Provider::Xai => "grok-beta",
            Provider::OpenRouter => "anthropic/claude-3-sonnet",
        }
    }
}

impl FromStr for Provider {
    type Err = DeckError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "xai" => Ok(Provider::Xai),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(DeckError::Config(format!("Unknown model provider: {}", other))),
        }
    }
}

impl fmt::Display for Provider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::OpenAi => "openai",
            Provider::Xai => "xai",
            Provider::OpenRouter => "openrouter",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

pub struct AiClient {
    provider: Provider,
    api_key: String,
    endpoint: Url,
    model: String,
    max_tokens: u32,
    agent: ureq::Agent,
}

impl AiClient {
    /// Client for `provider`, with the API key taken from its environment variable
    #[inline]
    pub fn new(provider: Provider, config: &AiConfig) -> Result<Self> {
        let var = provider.api_key_var();
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| DeckError::Config(format!("API key not found: {}", var)))?;

        Self::with_api_key(provider, api_key, config)
    }

    #[inline]
    pub fn with_api_key(provider: Provider, api_key: String, config: &AiConfig) -> Result<Self> {
        let endpoint = Url::parse(provider.endpoint())
            .with_context(|| format!("Invalid endpoint for {}", provider))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model: provider.default_model().to_string(),
            max_tokens: config.max_tokens,
            agent,
        })
    }

    /// Send requests somewhere other than the provider's public API
    #[inline]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user message and return the first completion
    #[inline]
    pub fn query(&self, prompt: &str) -> Result<String> {
        info!(
            "Querying {} ({}) with a {} char prompt",
            self.provider,
            self.model,
            prompt.chars().count()
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };
        let body = serde_json::to_string(&request).context("Failed to serialize chat request")?;

        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    DeckError::Http(format!("{} returned HTTP {}", self.provider, status))
                }
                other => DeckError::ServiceUnavailable(format!(
                    "Cannot reach {} at {}: {}",
                    self.provider, self.endpoint, other
                )),
            })?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                DeckError::Http(format!("{} response contained no choices", self.provider))
            })?;

        debug!("Received {} chars from {}", content.chars().count(), self.provider);
        Ok(content)
    }
}
