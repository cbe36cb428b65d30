
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_OVERLAP: usize = 150;

/// Configuration for content chunking
///
/// Sizes are measured in characters, not tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Length of every window except possibly the last
    pub chunk_size: usize,
    /// Number of characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// Collapse every whitespace run (newlines included) into a single space and trim
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Split text into overlapping fixed-size character windows
///
/// Each window after the first starts `overlap` characters before the end of the
/// previous one. The start always advances by at least one character, so an
/// `overlap` at or above `chunk_size` still terminates. A `chunk_size` of zero is
/// treated as one.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let length = chars.len();
    let chunk_size = chunk_size.max(1);

    let mut chunks = Vec::with_capacity(length.div_ceil(chunk_size));
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(length);
        chunks.push(chars[start..end].iter().collect::<String>());

        if end >= length {
            break;
        }

        start = end.saturating_sub(overlap).max(start + 1);
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        length,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}
