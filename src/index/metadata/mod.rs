
use super::Chunk;

/// Chunk count for one ingested source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
}

/// Append-only chunk records; record `i` belongs to vector `i` of the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<Chunk>,
}

impl MetadataStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: Vec<Chunk>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, returning its id
    #[inline]
    pub fn append(&mut self, chunk: Chunk) -> usize {
        self.records.push(chunk);
        self.records.len() - 1
    }

    /// # Panics
    /// If `id` was never assigned. Ids come from the vector index, which
    /// is kept the same length as this store, so this indicates a bug.
    #[inline]
    pub fn get(&self, id: usize) -> &Chunk {
        assert!(
            id < self.records.len(),
            "metadata id {} out of range for {} records",
            id,
            self.records.len()
        );
        &self.records[id]
    }

    #[inline]
    pub fn records(&self) -> &[Chunk] {
        &self.records
    }

    /// Distinct sources with their chunk counts, in first-ingested order
    #[inline]
    pub fn sources(&self) -> Vec<SourceSummary> {
        let mut summaries: Vec<SourceSummary> = Vec::new();
        for record in &self.records {
            match summaries.iter_mut().find(|s| s.source == record.source) {
                Some(summary) => summary.chunks += 1,
                None => summaries.push(SourceSummary {
                    source: record.source.clone(),
                    chunks: 1,
                }),
            }
        }
        summaries
    }

    /// Drop records appended after the first `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
