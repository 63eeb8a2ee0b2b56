use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::chunker::DocumentChunk;
use crate::db::dimension;
use crate::db::file_index::FileIndex;
use crate::db::{IndexedChunk, SearchResult, StoreStats, VectorStore, uniform_length};
use crate::embed::{Dimensionality, EmbeddingProvider};
use crate::error::{AppError, Result};

/// Deterministic embedder: identical text always maps to the identical vector.
/// Counts batch calls and embedded texts.
pub struct HashEmbedder {
    dims: usize,
    pub batch_calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            batch_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in text.bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (0..self.dims)
            .map(|i| (h.rotate_left((i * 7 % 64) as u32) & 0xffff) as f32 / 65535.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Fails any batch containing `marker`; otherwise behaves like [`HashEmbedder`].
pub struct FailingEmbedder {
    pub inner: HashEmbedder,
    pub marker: &'static str,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Embed("empty batch".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            return Err(AppError::Embed("upstream rejected the batch".into()));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// In-memory [`VectorStore`] whose search rejects queries of the wrong
/// length the way a real engine does, so the probe path is exercised.
pub struct MemoryStore {
    declared: usize,
    dims: Dimensionality,
    initialized: bool,
    rows: Option<Vec<IndexedChunk>>,
    files: FileIndex,
    batch_size: usize,
}

impl MemoryStore {
    pub fn new(declared: usize) -> Self {
        Self {
            declared,
            dims: Dimensionality::Unresolved { default: declared },
            initialized: false,
            rows: None,
            files: FileIndex::in_memory(),
            batch_size: crate::db::DEFAULT_BATCH_SIZE,
        }
    }

    /// A store over a pre-existing table.
    pub fn with_rows(declared: usize, rows: Vec<IndexedChunk>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::new(declared)
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn rows(&self) -> &[IndexedChunk] {
        self.rows.as_deref().unwrap_or_default()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(AppError::NotInitialized("store not initialized".into()))
        }
    }

    /// Raw engine search: no resolved-dimension check, only the engine's own.
    fn engine_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let rows = self.rows();
        if let Some(stored) = rows.first().map(|r| r.vector.len()) {
            if stored != query.len() {
                return Err(AppError::DimensionMismatch {
                    expected: stored,
                    actual: query.len(),
                });
            }
        }
        let mut hits: Vec<SearchResult> = rows
            .iter()
            .map(|row| SearchResult {
                distance: row
                    .vector
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
                chunk: row.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        if self.rows().is_empty() {
            self.dims = Dimensionality::Unresolved {
                default: self.declared,
            };
            return Ok(());
        }
        let assumed = self.dims.get();
        let width = dimension::reconcile(assumed, |query| {
            let found = self
                .engine_search(&query, 1)
                .map(|hits| hits.first().map(|h| h.chunk.vector.len()));
            std::future::ready(found)
        })
        .await;
        self.dims = Dimensionality::Resolved(width);
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dims.get()
    }

    fn has_table(&self) -> bool {
        self.rows.is_some()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn append(&mut self, rows: Vec<IndexedChunk>) -> Result<()> {
        self.ensure_initialized()?;
        let Some(width) = uniform_length(&rows)? else {
            return Ok(());
        };
        if let Dimensionality::Resolved(expected) = self.dims {
            if expected != width {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: width,
                });
            }
        }
        self.dims = Dimensionality::Resolved(width);
        self.rows.get_or_insert_with(Vec::new).extend(rows);
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        if self.rows.is_none() {
            return Err(AppError::NotInitialized("table does not exist".into()));
        }
        if query.len() != self.dims.get() {
            return Err(AppError::DimensionMismatch {
                expected: self.dims.get(),
                actual: query.len(),
            });
        }
        self.engine_search(query, top_k)
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        self.ensure_initialized()?;
        match &self.rows {
            Some(rows) => Ok(StoreStats { count: rows.len() }),
            None => Err(AppError::NotInitialized("table does not exist".into())),
        }
    }

    async fn clear_database(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.rows = None;
        self.dims = Dimensionality::Unresolved {
            default: self.declared,
        };
        self.files.clear()
    }

    async fn remove_file_from_index(&mut self, file_path: &str) -> Result<()> {
        self.ensure_initialized()?;
        if let Some(rows) = &mut self.rows {
            rows.retain(|r| r.chunk.file_path != file_path);
        }
        self.files.remove(file_path)
    }

    async fn mark_file_indexed(&mut self, file_path: &str, mtime: i64) -> Result<()> {
        self.ensure_initialized()?;
        self.files.mark(file_path, mtime)
    }

    async fn is_file_indexed(&self, file_path: &str, mtime: i64) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.files.is_current(file_path, mtime))
    }

    async fn get_indexed_files(&self) -> Result<HashMap<String, i64>> {
        self.ensure_initialized()?;
        Ok(self.files.all())
    }
}

/// Single-line chunk of `file_path` with a constant `width`-long vector.
pub fn row(file_path: &str, line: u32, text: &str, width: usize, fill: f32) -> IndexedChunk {
    IndexedChunk::new(
        DocumentChunk {
            text: text.to_string(),
            file_path: file_path.to_string(),
            start_line: line,
            end_line: line,
            start_char: 0,
            end_char: text.chars().count() as u32,
        },
        vec![fill; width],
    )
}
