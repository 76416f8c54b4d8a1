// Blocking client for the Ollama embedding API


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::DeckError;
use crate::config::OllamaConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// One entry of `GET /api/tags`
#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Invalid Ollama address in configuration")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Total attempts per request, at least one
    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; doubles on each further attempt
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The server answers and has the configured model
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.ping().context("Ollama is not reachable")?;
        self.validate_model()
            .context("Embedding model is not installed")?;

        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;
        self.get_text(&url).map_err(|e| {
            DeckError::ServiceUnavailable(format!("Ollama at {}: {:#}", self.base_url, e))
        })?;
        debug!("Ollama at {} answered", self.base_url);
        Ok(())
    }

    /// Fails with `DeckError::NotFound` when the model is not installed.
    /// An untagged name matches its `:latest` tag.
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;
        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            return Ok(());
        }

        let installed: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!("{} is not installed; Ollama has {:?}", self.model, installed);
        Err(DeckError::NotFound(format!(
            "Model '{}' is not available. Available models: {:?}",
            self.model, installed
        ))
        .into())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        let body = self.get_text(&url).context("Failed to list Ollama models")?;
        let tags: TagsResponse =
            serde_json::from_str(&body).context("Unexpected /api/tags response")?;

        debug!("Ollama has {} models", tags.models.len());
        Ok(tags.models)
    }

    /// Embed one text with the configured model
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        let url = self.endpoint("/api/embeddings")?;
        let request = serde_json::to_string(&EmbeddingRequest {
            model: &self.model,
            prompt: text,
        })
        .context("Failed to serialize embedding request")?;

        debug!("Embedding {} chars with {}", text.len(), self.model);
        let body = self
            .with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embedding")?;

        let response: EmbeddingResponse =
            serde_json::from_str(&body).context("Unexpected /api/embeddings response")?;
        if response.embedding.is_empty() {
            return Err(DeckError::Embedding(format!(
                "Model '{}' returned an empty embedding",
                self.model
            ))
            .into());
        }

        Ok(EmbeddingResult {
            text: text.to_string(),
            embedding: response.embedding,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build Ollama URL for {}", path))
    }

    fn get_text(&self, url: &Url) -> Result<String> {
        self.with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// Run `request`, retrying server errors and transport failures
    fn with_retry<F>(&self, mut request: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            let error = match request() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            if let ureq::Error::StatusCode(status) = &error {
                if *status < 500 {
                    return Err(DeckError::Http(format!("Ollama returned HTTP {}", status)).into());
                }
            } else if !is_transient(&error) {
                return Err(DeckError::Http(error.to_string()).into());
            }

            if attempt >= self.retry_attempts {
                return Err(DeckError::ServiceUnavailable(format!(
                    "{} (gave up after {} attempts)",
                    error, attempt
                ))
                .into());
            }

            let delay = retry_delay(self.backoff, attempt);
            warn!(
                "Ollama request failed ({}), retry {}/{} in {:?}",
                error,
                attempt,
                self.retry_attempts - 1,
                delay
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

/// Failures worth another attempt
fn is_transient(error: &ureq::Error) -> bool {
    matches!(
        error,
        ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
    )
}

/// `backoff * 2^(attempt - 1)`
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff.saturating_mul(1 << attempt.saturating_sub(1).min(16))
}

fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || (!wanted.contains(':') && available.strip_suffix(":latest") == Some(wanted))
}
