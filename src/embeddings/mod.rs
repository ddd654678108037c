// Embeddings module
// Text chunking and the embedders that turn chunks and queries into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{Config, ConfigError, EmbeddingProvider};
use crate::ollama::OllamaError;

pub use chunking::{ChunkingConfig, ChunkingError, TextSplitter};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding backend error: {0}")]
    Backend(#[from] OllamaError),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Requested {expected} embeddings but received {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Maps text to fixed-dimension vectors
///
/// Implementations return exactly one vector of length [`Embedder::dimension`]
/// per input, in input order, including for empty strings.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    #[inline]
    fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.encode(&[text.to_string()])?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

/// Build the embedder selected by `config.embedding.provider`
#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>, ConfigError> {
    config.embedding.validate()?;

    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingProvider::Hashing => {
            Arc::new(HashingEmbedder::new(config.embedding.dimension as usize))
        }
    };

    Ok(embedder)
}
