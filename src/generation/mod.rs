// Generation module
// Chat message types, prompt assembly and the language-model client seam

pub mod ollama;
pub mod prompt;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::ollama::OllamaError;

pub use ollama::OllamaChatClient;
pub use prompt::{NO_INFORMATION_RESPONSE, PromptBuilder, PromptOutcome};

/// Attempts made by [`generate_with_retry`]: the first call plus one retry
const GENERATION_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered messages for a single model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Error communicating with local LLM: {0}")]
    Backend(#[from] OllamaError),

    #[error("Error communicating with local LLM: no answer within {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Generation task failed: {0}")]
    Task(String),
}

impl GenerationError {
    /// Whether a second attempt may succeed
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_transient(),
            Self::Timeout(_) => true,
            Self::Cancelled | Self::Task(_) => false,
        }
    }
}

/// A stateless language-model call
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Run `request` under `timeout`, retrying once on a transient failure
///
/// Cancelling `cancel` returns [`GenerationError::Cancelled`] at once; the
/// in-flight call is abandoned rather than awaited.
#[inline]
pub async fn generate_with_retry(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GenerationError::Cancelled),
            outcome = tokio::time::timeout(timeout, client.generate(request)) => {
                outcome.unwrap_or(Err(GenerationError::Timeout(timeout)))
            }
        };

        match result {
            Ok(answer) => {
                debug!(
                    "Generation succeeded on attempt {} ({} chars)",
                    attempt,
                    answer.chars().count()
                );
                return Ok(answer);
            }
            Err(e) if e.is_transient() && attempt < GENERATION_ATTEMPTS => {
                warn!("Generation attempt {} failed, retrying: {}", attempt, e);
                attempt += 1;
            }
            Err(GenerationError::Cancelled) => {
                debug!("Generation cancelled on attempt {}", attempt);
                return Err(GenerationError::Cancelled);
            }
            Err(e) => {
                error!("Generation failed after {} attempt(s): {}", attempt, e);
                return Err(e);
            }
        }
    }
}
