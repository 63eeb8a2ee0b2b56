pub mod dimension;
pub mod file_index;
pub mod schema;
pub mod store;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::chunker::DocumentChunk;
use crate::embed::EmbeddingProvider;
use crate::error::{AppError, Result};

/// Chunks embedded per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A chunk with its stable id and embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedChunk {
    pub id: String,
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

impl IndexedChunk {
    pub fn new(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id().to_string(),
            chunk,
            vector,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: IndexedChunk,
    /// Distance from the query vector; smaller is nearer
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub count: usize,
}

/// Durable table of indexed chunks plus the per-file bookkeeping that drives
/// incremental indexing.
///
/// All vectors in the table share one length. Once a table exists its length
/// is authoritative over whatever the provider advertises.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open (or prepare) the backing table and reconcile its dimensionality. Idempotent.
    async fn initialize(&mut self) -> Result<()>;

    /// Effective vector length for reads and writes.
    fn dimensions(&self) -> usize;

    /// Whether a chunk table exists yet.
    fn has_table(&self) -> bool;

    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Append embedded rows, creating the table from them if none exists.
    async fn append(&mut self, rows: Vec<IndexedChunk>) -> Result<()>;

    /// Embed `chunks` in batches of `batch_size()` and append them.
    /// Nothing is written unless every batch embeds successfully.
    async fn index_chunks(
        &mut self,
        chunks: &[DocumentChunk],
        provider: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let rows = embed_chunks(chunks, provider, self.batch_size()).await?;
        let count = rows.len();
        self.append(rows).await?;
        Ok(count)
    }

    /// Nearest neighbours of `query`, nearest first.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    async fn get_stats(&self) -> Result<StoreStats>;

    /// Drop every chunk row and File Index Record.
    async fn clear_database(&mut self) -> Result<()>;

    /// Drop a file's chunk rows and its File Index Record.
    async fn remove_file_from_index(&mut self, file_path: &str) -> Result<()>;

    async fn mark_file_indexed(&mut self, file_path: &str, mtime: i64) -> Result<()>;

    async fn is_file_indexed(&self, file_path: &str, mtime: i64) -> Result<bool>;

    /// File Index Records as path → recorded mtime.
    async fn get_indexed_files(&self) -> Result<HashMap<String, i64>>;
}

/// Embed chunks in `batch_size` groups, pairing each with its vector.
pub async fn embed_chunks(
    chunks: &[DocumentChunk],
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<Vec<IndexedChunk>> {
    let batch_size = batch_size.max(1);
    let total = chunks.len().div_ceil(batch_size);
    let mut rows = Vec::with_capacity(chunks.len());

    for (i, batch) in chunks.chunks(batch_size).enumerate() {
        tracing::debug!("embedding batch {}/{}", i + 1, total);
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Embed(format!(
                "provider returned {} embeddings for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        rows.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| IndexedChunk::new(chunk, vector)),
        );
    }

    Ok(rows)
}

/// Common vector length of `rows`, or a mismatch naming the first deviation.
pub(crate) fn uniform_length(rows: &[IndexedChunk]) -> Result<Option<usize>> {
    let Some(first) = rows.first().map(|r| r.vector.len()) else {
        return Ok(None);
    };
    match rows.iter().find(|r| r.vector.len() != first) {
        Some(odd) => Err(AppError::DimensionMismatch {
            expected: first,
            actual: odd.vector.len(),
        }),
        None => Ok(Some(first)),
    }
}
