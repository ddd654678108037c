//! Ollama HTTP plumbing
//!
//! Shared by the embedding and generation clients: URL handling, the blocking
//! `ureq` agent, retry with exponential backoff, and server health checks.


use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Ollama returned HTTP {status}")]
    Status { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid response from Ollama: {0}")]
    InvalidResponse(String),

    #[error("Failed to build request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Model '{model}' is not available. Available models: {available:?}")]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },
}

impl OllamaError {
    /// Whether retrying the same request may succeed
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status } => *status >= 500,
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::InvalidResponse(_) | Self::Url(_) | Self::ModelNotFound { .. } => false,
        }
    }
}

impl From<ureq::Error> for OllamaError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) => Self::Status { status },
            ureq::Error::Timeout(_) => Self::Timeout(error.to_string()),
            ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
                Self::Transport(error.to_string())
            }
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Blocking HTTP client for a single Ollama server
#[derive(Debug, Clone)]
pub struct OllamaHttp {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

impl OllamaHttp {
    #[inline]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            agent: Self::build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    fn build_agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into()
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = Self::build_agent(timeout);
        self
    }

    /// Total attempts per request, the first included
    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries double it
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET `path` and return the response body
    #[inline]
    pub fn get(&self, path: &str) -> Result<String, OllamaError> {
        let url = self.base_url.join(path)?;
        self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST `body` as JSON to `path` and return the response body
    #[inline]
    pub fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, OllamaError> {
        let url = self.base_url.join(path)?;
        let request_json = serde_json::to_string(body)
            .map_err(|e| OllamaError::InvalidResponse(format!("unserializable request: {}", e)))?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// Test connection to the server and verify `model` is available
    #[inline]
    pub fn health_check(&self, model: &str) -> Result<(), OllamaError> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;
        if !models.iter().any(|m| model_matches(&m.name, model)) {
            let available: Vec<String> = models.into_iter().map(|m| m.name).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                model, available
            );
            return Err(OllamaError::ModelNotFound {
                model: model.to_string(),
                available,
            });
        }

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, model
        );
        Ok(())
    }

    /// List all models installed on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, OllamaError> {
        let response_text = self.get("/api/tags")?;
        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| OllamaError::InvalidResponse(format!("models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String, OllamaError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let error = OllamaError::from(error);
                    if !error.is_transient() {
                        warn!("Non-retryable error: {}", error);
                        return Err(error);
                    }

                    warn!(
                        "Transient error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error
            .unwrap_or_else(|| OllamaError::Transport("request failed after retries".to_string())))
    }
}

/// `all-minilm` is listed by the server as `all-minilm:latest`
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed.strip_suffix(":latest") == Some(wanted))
}
