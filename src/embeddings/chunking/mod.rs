#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

use crate::ingest::extractor::{Segment, SegmentMetadata};

/// Separators tried in order when a piece of text is too long
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Represents a chunk of text ready for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Metadata inherited from the parent segment
    pub metadata: SegmentMetadata,
    /// Token count under the configured encoding
    pub token_count: usize,
}

/// Configuration for token-window chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in tokens
    pub chunk_size: usize,
    /// Overlap in tokens between adjacent chunks
    pub chunk_overlap: usize,
    /// Tokenizer encoding used to measure length
    pub encoding: String,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            encoding: Encoding::Cl100kBase.name().to_string(),
        }
    }
}

/// Supported BPE encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    #[inline]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cl100k_base" => Some(Self::Cl100kBase),
            "o200k_base" => Some(Self::O200kBase),
            _ => None,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
        }
    }
}

/// Counts model tokens for a fixed encoding
#[derive(Clone)]
pub struct Tokenizer {
    bpe: Arc<CoreBPE>,
    encoding: Encoding,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl Tokenizer {
    #[inline]
    pub fn new(encoding: Encoding) -> Result<Self> {
        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        }
        .with_context(|| format!("Failed to load {} tokenizer", encoding.name()))?;

        Ok(Self {
            bpe: Arc::new(bpe),
            encoding,
        })
    }

    /// Number of tokens in `text`; special-token markers count as plain text
    #[inline]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Splits segments into overlapping token windows
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Tokenizer,
}

impl Chunker {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        anyhow::ensure!(config.chunk_size > 0, "chunk size must be greater than zero");
        anyhow::ensure!(
            config.chunk_overlap < config.chunk_size,
            "chunk overlap ({}) must be smaller than chunk size ({})",
            config.chunk_overlap,
            config.chunk_size
        );
        let encoding = Encoding::from_name(&config.encoding)
            .ok_or_else(|| anyhow::anyhow!("Unknown tokenizer encoding: {}", config.encoding))?;

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            tokenizer: Tokenizer::new(encoding)?,
        })
    }

    #[inline]
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Chunk every segment, preserving segment order and metadata
    #[inline]
    pub fn chunk_segments(&self, segments: &[Segment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for segment in segments {
            for text in self.split_text(&segment.text) {
                let token_count = self.tokenizer.count(&text);
                chunks.push(Chunk {
                    text,
                    metadata: segment.metadata.clone(),
                    token_count,
                });
            }
        }

        debug!(
            "Chunked {} segments into {} chunks (avg {} tokens)",
            segments.len(),
            chunks.len(),
            chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
        );

        chunks
    }

    /// Split text into windows of at most `chunk_size` tokens
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in pieces {
            if self.tokenizer.count(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                warn!(
                    "Piece of {} tokens cannot be split below chunk size {}",
                    self.tokenizer.count(&piece),
                    self.chunk_size
                );
                push_trimmed(&mut chunks, &piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting, separator));
        }

        chunks
    }

    /// Greedily pack pieces into windows, carrying up to `chunk_overlap` tokens forward
    fn merge_pieces(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();

        for piece in pieces {
            if !window.is_empty() && self.window_tokens(&window, Some(piece), separator) > self.chunk_size
            {
                push_trimmed(&mut merged, &join_window(&window, None, separator));

                while !window.is_empty()
                    && (self.window_tokens(&window, None, separator) > self.chunk_overlap
                        || self.window_tokens(&window, Some(piece), separator) > self.chunk_size)
                {
                    window.pop_front();
                }
            }
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_trimmed(&mut merged, &join_window(&window, None, separator));
        }

        merged
    }

    fn window_tokens(&self, window: &VecDeque<&str>, next: Option<&str>, separator: &str) -> usize {
        self.tokenizer.count(&join_window(window, next, separator))
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn join_window(window: &VecDeque<&str>, next: Option<&str>, separator: &str) -> String {
    let mut joined = String::new();
    for (i, piece) in window.iter().copied().chain(next).enumerate() {
        if i > 0 {
            joined.push_str(separator);
        }
        joined.push_str(piece);
    }
    joined
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
