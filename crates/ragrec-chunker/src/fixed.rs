//! Fixed-size chunking with overlap.
//!
//! Sizes are measured in characters, not bytes, so multi-byte text is never
//! split inside a code point.

use std::ops::Range;

use ragrec_core::{ChunkConfig, ValidationError};
use tracing::debug;

/// A chunk produced by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutput {
    /// The chunk text
    pub content: String,
    /// Character range of the chunk in the source text
    pub char_range: Range<usize>,
}

/// Splits text into windows of at most `chunk_size` characters, each sharing
/// `overlap` characters with the previous one.
///
/// Window ends are pulled back to a natural boundary (paragraph, line,
/// sentence, whitespace) found in the last fifth of the window. Windows that
/// contain only whitespace are dropped.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    config: ChunkConfig,
}

impl FixedSizeChunker {
    /// Create a chunker, rejecting a configuration that would never advance.
    pub fn new(config: ChunkConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split `text` into overlapping chunks, in document order.
    pub fn split(&self, text: &str) -> Vec<ChunkOutput> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < total {
            let target_end = (start + self.config.chunk_size).min(total);
            let end = find_break_point(&chars, start, target_end, total);

            let window = &chars[start..end];
            if window.iter().any(|c| !c.is_whitespace()) {
                chunks.push(ChunkOutput {
                    content: window.iter().collect(),
                    char_range: start..end,
                });
            }

            if end >= total {
                break;
            }
            start = end.saturating_sub(self.config.overlap).max(start + 1);
        }

        debug!("Split {} chars into {} chunks", total, chunks.len());
        chunks
    }
}

/// Find a break point at or before `target_end`.
fn find_break_point(chars: &[char], start: usize, target_end: usize, total: usize) -> usize {
    if target_end >= total {
        return total;
    }

    let search_start = target_end - (target_end - start) / 5;

    // Paragraph
    for i in (search_start..target_end.saturating_sub(1)).rev() {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            return i + 2;
        }
    }

    // Line
    for i in (search_start..target_end).rev() {
        if chars[i] == '\n' {
            return i + 1;
        }
    }

    // Sentence
    for i in (search_start..target_end.saturating_sub(1)).rev() {
        if matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace() {
            return i + 1;
        }
    }

    // Word
    for i in (search_start..target_end).rev() {
        if chars[i].is_whitespace() {
            return i + 1;
        }
    }

    target_end
}
