
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, GenerationClient, GenerationError, GenerationRequest};
use crate::config::{Config, ConfigError};
use crate::ollama::{OllamaError, OllamaHttp};

/// Chat completion client for the Ollama `/api/chat` endpoint
///
/// Requests are sent non-streaming and are not retried at the HTTP layer;
/// [`super::generate_with_retry`] owns the retry and timeout policy.
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    http: OllamaHttp,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChatClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let base_url = config.ollama_url()?;
        let http = OllamaHttp::new(base_url)
            .with_timeout(Duration::from_secs(config.generation.timeout_secs))
            .with_retry_attempts(1);

        Ok(Self {
            http,
            model: config.generation.model.clone(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Test connection to Ollama and verify the chat model is installed
    #[inline]
    pub fn health_check(&self) -> Result<(), OllamaError> {
        self.http.health_check(&self.model)
    }

    fn chat(&self, request: &GenerationRequest) -> Result<String, OllamaError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
        };

        debug!(
            "Sending {} messages to chat model '{}'",
            request.messages.len(),
            self.model
        );

        let response_text = self.http.post_json("/api/chat", &body)?;
        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| OllamaError::InvalidResponse(format!("chat response: {}", e)))?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl GenerationClient for OllamaChatClient {
    #[inline]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let client = self.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || client.chat(&request))
            .await
            .map_err(|e| GenerationError::Task(e.to_string()))?
            .map_err(GenerationError::from)
    }
}
