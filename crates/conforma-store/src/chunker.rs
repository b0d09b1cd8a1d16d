//! Overlapping text chunking for ingestion.
//!
//! Splits documents into fixed-size character windows with overlap so that
//! context is not lost at chunk boundaries. Boundaries back off to the last
//! space so words are never cut in half.

use crate::StoreError;

/// One chunk of a document. Offsets are character positions in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// Splits text into overlapping character-window chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, StoreError> {
        if chunk_overlap >= chunk_size {
            return Err(StoreError::InvalidChunking {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split `text` into overlapping chunks. Whitespace-only input yields no
    /// chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;

        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());

            // Back off to the last space so we never cut mid-word.
            if end < chars.len() {
                if let Some(pos) = chars[start..end].iter().rposition(|c| *c == ' ') {
                    if pos > 0 {
                        end = start + pos;
                    }
                }
            }

            let chunk_text: String = chars[start..end].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    text: trimmed.to_string(),
                    chunk_index,
                    start_char: start,
                    end_char: end,
                });
                chunk_index += 1;
            }

            if end == chars.len() {
                break;
            }

            // Advance with overlap; if overlap would not move forward, skip
            // past the window instead of looping.
            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}
