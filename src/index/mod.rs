// Index module
// Flat vector index, positionally aligned chunk metadata, and their on-disk pair

pub mod flat;
pub mod metadata;
pub mod persistence;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use flat::{FlatIndex, Neighbor};
pub use metadata::{MetadataStore, SourceSummary};
pub use persistence::{IndexStore, LoadError, PersistedIndex, SaveError};
pub use state::IndexState;

/// A slice of a source document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Display name of the document the chunk came from
    pub source: String,
}

impl Chunk {
    #[inline]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{vectors} vectors cannot be paired with {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },
}
