use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
    builder::{FixedSizeListBuilder, Float32Builder, StringBuilder, UInt32Builder},
};
use arrow_schema::ArrowError;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::chunker::DocumentChunk;
use crate::db::dimension;
use crate::db::file_index::{self, FileIndex};
use crate::db::schema::{VECTOR_COLUMN, chunks_schema, declared_dimensions};
use crate::db::{
    DEFAULT_BATCH_SIZE, IndexedChunk, SearchResult, StoreStats, VectorStore, uniform_length,
};
use crate::embed::Dimensionality;
use crate::error::{AppError, Result};

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

/// LanceDB-backed [`VectorStore`].
///
/// The chunk table is created lazily from the first appended rows, so its
/// width is whatever the provider actually produced. File Index Records live
/// in a JSON side-file inside the database directory.
pub struct LanceStore {
    db_path: PathBuf,
    table_name: String,
    batch_size: usize,
    /// Width advertised by the provider, used until a table exists
    declared: usize,
    dims: Dimensionality,
    conn: Option<lancedb::Connection>,
    table: Option<lancedb::Table>,
    files: FileIndex,
}

impl LanceStore {
    pub fn new(db_path: &Path, table_name: &str, declared_dims: usize) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            table_name: table_name.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            declared: declared_dims,
            dims: Dimensionality::Unresolved {
                default: declared_dims,
            },
            conn: None,
            table: None,
            files: FileIndex::in_memory(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn connection(&self) -> Result<&lancedb::Connection> {
        self.conn.as_ref().ok_or_else(|| {
            AppError::NotInitialized("database not initialized; call initialize() first".into())
        })
    }

    fn table(&self) -> Result<&lancedb::Table> {
        self.connection()?;
        self.table.as_ref().ok_or_else(|| {
            AppError::NotInitialized(format!(
                "table '{}' does not exist; index documents first",
                self.table_name
            ))
        })
    }

    /// The vector column's declared width is authoritative; probing is only
    /// needed when the column is not a fixed-size list.
    async fn table_dimensions(table: &lancedb::Table, assumed: usize) -> Result<usize> {
        let schema = table.schema().await?;
        if let Some(width) = declared_dimensions(&schema) {
            return Ok(width);
        }
        Ok(dimension::reconcile(assumed, |query| probe(table, query)).await)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.conn.is_none() {
            std::fs::create_dir_all(&self.db_path)?;
            let uri = self.db_path.to_string_lossy().into_owned();
            self.conn = Some(lancedb::connect(&uri).execute().await?);
        }
        self.files = FileIndex::load(&self.db_path.join(file_index::FILE_NAME))?;

        let opened = self
            .connection()?
            .open_table(&self.table_name)
            .execute()
            .await;
        match opened {
            Ok(table) => {
                let width = Self::table_dimensions(&table, self.dims.get()).await?;
                tracing::debug!("opened table '{}' ({width} dims)", self.table_name);
                self.dims = Dimensionality::Resolved(width);
                self.table = Some(table);
            }
            Err(lancedb::Error::TableNotFound { .. }) => {
                // Created with the first appended batch
                self.table = None;
                self.dims = Dimensionality::Unresolved {
                    default: self.declared,
                };
            }
            Err(e) => return Err(AppError::Database(e)),
        }
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dims.get()
    }

    fn has_table(&self) -> bool {
        self.table.is_some()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn append(&mut self, rows: Vec<IndexedChunk>) -> Result<()> {
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

        if self.table.is_none() {
            tracing::info!("creating table '{}' with {width}-dim vectors", self.table_name);
            let table = self
                .connection()?
                .create_empty_table(&self.table_name, chunks_schema(width))
                .execute()
                .await?;
            self.table = Some(table);
            self.dims = Dimensionality::Resolved(width);
        }

        let schema = chunks_schema(width);
        let batch = to_record_batch(&rows, width)?;
        let reader = RecordBatchIterator::new(
            vec![Ok(batch) as std::result::Result<RecordBatch, ArrowError>],
            schema,
        );
        self.table()?.add(reader).execute().await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let table = self.table()?;
        let expected = self.dims.get();
        if query.len() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Ok(vec![]);
        }

        let mut stream = table
            .vector_search(query)?
            .column(VECTOR_COLUMN)
            .limit(top_k)
            .execute()
            .await?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            for i in 0..batch.num_rows() {
                let chunk = DocumentChunk {
                    text: get_str_col(&batch, "text", i)?,
                    file_path: get_str_col(&batch, "file_path", i)?,
                    start_line: get_u32_col(&batch, "start_line", i)?,
                    end_line: get_u32_col(&batch, "end_line", i)?,
                    start_char: get_u32_col(&batch, "start_char", i)?,
                    end_char: get_u32_col(&batch, "end_char", i)?,
                };
                results.push(SearchResult {
                    chunk: IndexedChunk {
                        id: get_str_col(&batch, "id", i)?,
                        chunk,
                        vector: get_vector_col(&batch, i)?,
                    },
                    distance: get_f32_col(&batch, "_distance", i).unwrap_or(0.0),
                });
            }
        }

        // Stable: equal distances keep the engine's order
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let count = self.table()?.count_rows(None).await?;
        Ok(StoreStats { count })
    }

    async fn clear_database(&mut self) -> Result<()> {
        let conn = self.connection()?;
        match conn.drop_table(&self.table_name, &[]).await {
            Ok(()) | Err(lancedb::Error::TableNotFound { .. }) => {}
            Err(e) => return Err(AppError::Database(e)),
        }
        self.table = None;
        self.dims = Dimensionality::Unresolved {
            default: self.declared,
        };
        self.files.clear()?;
        Ok(())
    }

    async fn remove_file_from_index(&mut self, file_path: &str) -> Result<()> {
        self.connection()?;
        if let Some(table) = &self.table {
            let escaped = file_path.replace('\'', "''");
            table.delete(&format!("file_path = '{}'", escaped)).await?;
        }
        self.files.remove(file_path)
    }

    async fn mark_file_indexed(&mut self, file_path: &str, mtime: i64) -> Result<()> {
        self.connection()?;
        self.files.mark(file_path, mtime)
    }

    async fn is_file_indexed(&self, file_path: &str, mtime: i64) -> Result<bool> {
        self.connection()?;
        Ok(self.files.is_current(file_path, mtime))
    }

    async fn get_indexed_files(&self) -> Result<HashMap<String, i64>> {
        self.connection()?;
        Ok(self.files.all())
    }
}

/// 1-NN query used by dimension reconciliation; yields the hit's vector length.
async fn probe(table: &lancedb::Table, query: Vec<f32>) -> Result<Option<usize>> {
    let mut stream = table
        .vector_search(query)?
        .column(VECTOR_COLUMN)
        .limit(1)
        .execute()
        .await?;
    while let Some(batch) = stream.try_next().await? {
        if batch.num_rows() > 0 {
            return Ok(Some(get_vector_col(&batch, 0)?.len()));
        }
    }
    Ok(None)
}

fn to_record_batch(rows: &[IndexedChunk], width: usize) -> Result<RecordBatch> {
    let mut id_builder = StringBuilder::new();
    let mut text_builder = StringBuilder::new();
    let mut file_path_builder = StringBuilder::new();
    let mut start_line_builder = UInt32Builder::new();
    let mut end_line_builder = UInt32Builder::new();
    let mut start_char_builder = UInt32Builder::new();
    let mut end_char_builder = UInt32Builder::new();
    let mut vector_builder = FixedSizeListBuilder::new(Float32Builder::new(), width as i32);

    for row in rows {
        id_builder.append_value(&row.id);
        text_builder.append_value(&row.chunk.text);
        file_path_builder.append_value(&row.chunk.file_path);
        start_line_builder.append_value(row.chunk.start_line);
        end_line_builder.append_value(row.chunk.end_line);
        start_char_builder.append_value(row.chunk.start_char);
        end_char_builder.append_value(row.chunk.end_char);
        vector_builder.values().append_slice(&row.vector);
        vector_builder.append(true);
    }

    RecordBatch::try_new(
        chunks_schema(width),
        vec![
            Arc::new(id_builder.finish()),
            Arc::new(text_builder.finish()),
            Arc::new(file_path_builder.finish()),
            Arc::new(start_line_builder.finish()),
            Arc::new(end_line_builder.finish()),
            Arc::new(start_char_builder.finish()),
            Arc::new(end_char_builder.finish()),
            Arc::new(vector_builder.finish()),
        ],
    )
    .map_err(|e| AppError::Other(e.into()))
}

fn get_str_col(batch: &RecordBatch, name: &str, row: usize) -> Result<String> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("missing column: {}", name)))?;
    let arr = col
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("column {} is not StringArray", name)))?;
    Ok(arr.value(row).to_string())
}

fn get_u32_col(batch: &RecordBatch, name: &str, row: usize) -> Result<u32> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("missing column: {}", name)))?;
    let arr = col
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("column {} is not UInt32Array", name)))?;
    Ok(arr.value(row))
}

fn get_f32_col(batch: &RecordBatch, name: &str, row: usize) -> Result<f32> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("missing column: {}", name)))?;
    let arr = col
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("column {} is not Float32Array", name)))?;
    Ok(arr.value(row))
}

fn get_vector_col(batch: &RecordBatch, row: usize) -> Result<Vec<f32>> {
    let col = batch
        .column_by_name(VECTOR_COLUMN)
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("missing column: {}", VECTOR_COLUMN)))?;
    let list = col
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| {
            AppError::Other(anyhow::anyhow!("column {} is not FixedSizeListArray", VECTOR_COLUMN))
        })?;
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("vector items are not Float32")))?;
    Ok(floats.values().to_vec())
}
