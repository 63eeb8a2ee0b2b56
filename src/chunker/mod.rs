pub mod lines;
pub mod text;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};


/// A contiguous span of one file's text.
///
/// Lines are 1-based and inclusive. Character offsets count Unicode scalar
/// values from the start of the file; `end_char` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_char: u32,
    pub end_char: u32,
}

impl DocumentChunk {
    pub fn id(&self) -> ChunkId {
        ChunkId {
            file_path: self.file_path.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }
}

/// Stable chunk address, rendered as `<file_path>:<start_line>:<end_line>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.start_line, self.end_line)
    }
}

impl FromStr for ChunkId {
    type Err = AppError;

    // Split from the right: file paths may themselves contain ':'.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.rsplitn(3, ':');
        let (Some(end), Some(start), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Other(anyhow::anyhow!("malformed chunk id: {s}")));
        };
        let parse = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| AppError::Other(anyhow::anyhow!("malformed chunk id: {s}")))
        };
        Ok(ChunkId {
            file_path: path.to_string(),
            start_line: parse(start)?,
            end_line: parse(end)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerOptions {
    /// Target chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks shorter than this (after trimming) are dropped unless they are the only chunk
    pub min_chunk_size: Option<usize>,
}

impl ChunkerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Other(anyhow::anyhow!("chunk_size must be greater than 0")));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Other(anyhow::anyhow!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits one file's text into ordered, position-tagged spans.
///
/// Implementations are pure: identical input and options yield identical output.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str, file_path: &str, options: &ChunkerOptions) -> Vec<DocumentChunk>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Character,
    Lines,
}

pub fn create_chunker(strategy: ChunkStrategy) -> Box<dyn Chunker> {
    match strategy {
        ChunkStrategy::Character => Box::new(text::CharacterChunker),
        ChunkStrategy::Lines => Box::new(lines::LineChunker),
    }
}

/// Rough token count used for workload reporting.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0;
    }
    let avg_chars_per_word = text.chars().count() as f64 / words as f64;
    let tokens_per_word = if avg_chars_per_word > 5.0 { 1.3 } else { 1.0 };
    (words as f64 * tokens_per_word).ceil() as usize
}

/// Drop chunks below `min_chunk_size`, never emptying a non-empty result.
pub(crate) fn apply_min_size(
    chunks: Vec<DocumentChunk>,
    options: &ChunkerOptions,
) -> Vec<DocumentChunk> {
    let Some(min) = options.min_chunk_size else {
        return chunks;
    };
    if chunks.len() <= 1 {
        return chunks;
    }
    let first = chunks[0].clone();
    let kept: Vec<DocumentChunk> = chunks
        .into_iter()
        .filter(|c| c.text.trim().chars().count() >= min)
        .collect();
    if kept.is_empty() { vec![first] } else { kept }
}

/// Maps character offsets to 1-based line numbers.
pub(crate) struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(chars: &[char]) -> Self {
        let newlines = chars
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == '\n')
            .map(|(i, _)| i)
            .collect();
        Self { newlines }
    }

    /// Line containing the character at `offset`. A '\n' belongs to the line it ends.
    pub(crate) fn line_of(&self, offset: usize) -> u32 {
        (self.newlines.partition_point(|&n| n < offset) + 1) as u32
    }
}
