#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::ops::Range;

use super::IndexError;

/// A search hit: stored vector id and its squared Euclidean distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Exhaustive nearest-neighbor index over contiguous vector storage
///
/// Ids are insertion positions. Vectors are never removed or updated.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// # Panics
    /// If `dimension` is zero.
    #[inline]
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "vector dimension must be non-zero");
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from `count * dimension` packed values
    pub(crate) fn from_packed(dimension: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: data.len(),
            });
        }
        Ok(Self { dimension, data })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    #[inline]
    pub fn count(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dimension).nth(id)
    }

    /// All vectors packed in id order
    #[inline]
    pub fn packed(&self) -> &[f32] {
        &self.data
    }

    /// Append vectors, returning the ids they were assigned
    ///
    /// Every vector is checked before any is stored, so on error the index
    /// is unchanged.
    #[inline]
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>, IndexError> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        let start = self.count();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        Ok(start..self.count())
    }

    /// Up to `k` nearest vectors, closest first, ties broken by lower id
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, stored)| Neighbor {
                id,
                distance: squared_euclidean(query, stored),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }

    /// Drop vectors appended after the first `count`
    pub(crate) fn truncate(&mut self, count: usize) {
        self.data.truncate(count * self.dimension);
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| {
        let diff = x - y;
        diff.mul_add(diff, acc)
    })
}
