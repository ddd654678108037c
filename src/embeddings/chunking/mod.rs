
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

/// Separators tried in order, from paragraph breaks down to a hard character cut
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for text chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}

/// Recursive character splitter
///
/// Splits on the coarsest separator present in the text, recursing into
/// finer separators only for pieces that are still too long, then packs the
/// pieces into windows of at most `chunk_size` characters that share up to
/// `chunk_overlap` characters with their predecessor.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        if config.chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: config.chunk_overlap,
                size: config.chunk_size,
            });
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        })
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks
    ///
    /// Blank input yields no chunks.
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chunks = self.split_recursive(text, &DEFAULT_SEPARATORS);

        debug!(
            "Split {} characters into {} chunks (size {}, overlap {})",
            char_len(text),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();
        let (separator, finer) = pick_separator(text, separators);

        let mut short_pieces: Vec<(&str, usize)> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            let len = char_len(piece);
            if len < self.chunk_size {
                short_pieces.push((piece, len));
                continue;
            }

            if !short_pieces.is_empty() {
                final_chunks.extend(self.merge_pieces(&short_pieces));
                short_pieces.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !short_pieces.is_empty() {
            final_chunks.extend(self.merge_pieces(&short_pieces));
        }

        final_chunks
    }

    /// Pack pieces into overlapping windows
    fn merge_pieces(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &(piece, len) in pieces {
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);

                // Keep at most `chunk_overlap` characters, and only as many as
                // leave room for the incoming piece.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, separator) in separators.iter().enumerate() {
        let separator = *separator;
        if separator.is_empty() || text.contains(separator) {
            return (separator, separators.get(i + 1..).unwrap_or_default());
        }
    }

    (separators.last().copied().unwrap_or_default(), &[])
}

/// Split `text` before every occurrence of `separator`, so each piece after
/// the first starts with the separator. An empty separator splits into
/// characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    let mut pieces = Vec::new();

    if separator.is_empty() {
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            let (head, tail) = rest.split_at(c.len_utf8());
            pieces.push(head);
            rest = tail;
        }
        return pieces;
    }

    let mut rest = text;
    let mut offset = 0;
    for (idx, _) in text.match_indices(separator) {
        let (head, tail) = rest.split_at(idx - offset);
        pieces.push(head);
        rest = tail;
        offset = idx;
    }
    pieces.push(rest);

    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
