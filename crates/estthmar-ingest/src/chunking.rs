//! Recursive character text splitting with overlap.
//!
//! Text is split on the first separator from `["\n\n", "\n", " ", ""]` that
//! occurs in it. The separator stays attached to the start of the piece that
//! follows it. Pieces that still exceed the chunk size are split again with
//! the remaining separators, and runs of small pieces are merged back into
//! chunks of at most `chunk_size` characters, each new chunk starting with up
//! to `chunk_overlap` characters carried over from the previous one.
//!
//! Sizes are measured in characters, not bytes.

use std::collections::VecDeque;

use estthmar_core::ChunkingConfig;
use tracing::warn;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk produced from a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    /// 0-based position within the page.
    pub chunk_index: usize,
}

/// Recursive chunker that prefers paragraph, then line, then word boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
        }
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.split_text(text, &SEPARATORS)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| TextChunk { text, chunk_index })
            .collect()
    }

    fn split_text(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if remaining.is_empty() {
                if let Some(t) = trimmed(piece) {
                    chunks.push(t);
                }
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily merge pieces into chunks, carrying a tail of at most
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !window.is_empty() {
                    if let Some(t) = trimmed(&window.iter().copied().collect::<String>()) {
                        out.push(t);
                    }
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(t) = trimmed(&window.iter().copied().collect::<String>()) {
            out.push(t);
        }
        out
    }
}

impl From<ChunkingConfig> for RecursiveChunker {
    fn from(config: ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        ChunkingConfig::default().into()
    }
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Split on `separator`, keeping each separator at the start of the piece
/// after it. An empty separator splits into characters.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
