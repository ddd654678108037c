
use std::ops::Range;

use super::{Chunk, FlatIndex, IndexError, MetadataStore, PersistedIndex};

/// The live index together with the chunk records it is aligned with
///
/// Every method keeps `index.count() == metadata.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexState {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl IndexState {
    /// # Panics
    /// If `dimension` is zero.
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            metadata: MetadataStore::new(),
        }
    }

    #[inline]
    pub fn from_persisted(persisted: PersistedIndex) -> Self {
        Self {
            index: persisted.index,
            metadata: persisted.metadata,
        }
    }

    #[inline]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    #[inline]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.index.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append one vector per chunk; on error nothing is appended
    #[inline]
    pub fn append(
        &mut self,
        vectors: &[Vec<f32>],
        chunks: Vec<Chunk>,
    ) -> Result<Range<usize>, IndexError> {
        if vectors.len() != chunks.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }

        let ids = self.index.add(vectors)?;
        for chunk in chunks {
            self.metadata.append(chunk);
        }
        Ok(ids)
    }

    /// Roll both structures back to their first `count` entries
    #[inline]
    pub fn truncate(&mut self, count: usize) {
        self.index.truncate(count);
        self.metadata.truncate(count);
    }

    /// Nearest chunks to `query` with their squared distances, closest first
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&Chunk, f32)>, IndexError> {
        let neighbors = self.index.search(query, k)?;
        Ok(neighbors
            .into_iter()
            .map(|neighbor| (self.metadata.get(neighbor.id), neighbor.distance))
            .collect())
    }
}
