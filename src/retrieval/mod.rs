// Retrieval module
// Embeds a question and returns the closest indexed chunks


use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tracing::debug;

use crate::embeddings::{Embedder, EmbeddingError};
use crate::index::{IndexError, IndexState};

/// One retrieved chunk; `score` is the squared Euclidean distance, lower is closer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index search failed: {0}")]
    Index(#[from] IndexError),

    #[error("Embedding task failed: {0}")]
    Task(#[from] JoinError),
}

/// Shared handle to the live index used by both ingestion and retrieval
pub type SharedIndex = Arc<RwLock<IndexState>>;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    state: SharedIndex,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, state: SharedIndex) -> Self {
        Self { embedder, state }
    }

    /// Up to `k` chunks closest to `query`, closest first
    ///
    /// An empty index answers immediately without embedding the query.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if k == 0 || self.state.read().await.is_empty() {
            debug!("Index is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.encode_one(&query)).await??;

        let state = self.state.read().await;
        let results: Vec<RetrievalResult> = state
            .search(&vector, k)?
            .into_iter()
            .map(|(chunk, score)| RetrievalResult {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                score,
            })
            .collect();

        debug!(
            "Retrieved {} of {} chunks (k = {})",
            results.len(),
            state.count(),
            k
        );
        Ok(results)
    }
}
