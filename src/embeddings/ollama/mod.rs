#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{Embedder, EmbeddingError};
use crate::config::{Config, ConfigError};
use crate::ollama::{OllamaError, OllamaHttp};

/// Output size of `all-minilm`, the default embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

/// Embedder backed by the Ollama `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: OllamaHttp,
    model: String,
    batch_size: u32,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let base_url = config.ollama_url()?;

        Ok(Self {
            http: OllamaHttp::new(base_url),
            model: config.embedding.model.clone(),
            batch_size: config.embedding.batch_size.max(1),
            dimension: config.embedding.dimension as usize,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.http = self.http.with_backoff(backoff);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Test connection to Ollama and verify the embedding model is installed
    #[inline]
    pub fn health_check(&self) -> Result<(), OllamaError> {
        self.http.health_check(&self.model)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let response_text = self.http.post_json("/api/embed", &request)?;
        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            OllamaError::InvalidResponse(format!("embedding response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.embeddings.len(),
            });
        }

        for embedding in &response.embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Empty strings are answered with the zero vector without a request
    #[inline]
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = vec![vec![0.0; self.dimension]; texts.len()];
        let pending: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.is_empty())
            .map(|(i, text)| (i, text.as_str()))
            .collect();

        // Process in batches to avoid overwhelming the server
        for batch in pending.chunks(self.batch_size as usize) {
            let inputs: Vec<&str> = batch.iter().map(|(_, text)| *text).collect();
            let embeddings = self.embed_batch(&inputs)?;

            for ((position, _), embedding) in batch.iter().zip(embeddings) {
                results[*position] = embedding;
            }
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
