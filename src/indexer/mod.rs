pub mod walker;

use std::collections::HashSet;
use std::path::Path;

use crate::chunker::{Chunker, ChunkerOptions, create_chunker, estimate_tokens};
use crate::cli::IndexArgs;
use crate::config::AppConfig;
use crate::db::VectorStore;
use crate::db::store::LanceStore;
use crate::embed::{EmbeddingProvider, create_provider};
use crate::error::{AppError, Result};
use walker::FileInfo;

#[cfg(test)]
#[path = "indexer_tests.rs"]
mod indexer_tests;

/// Outcome counts of one indexing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub files_removed: usize,
    pub chunks_written: usize,
}

pub async fn run(
    config: &AppConfig,
    db_path: &Path,
    target_dir: &Path,
    args: IndexArgs,
) -> Result<()> {
    let options = ChunkerOptions {
        chunk_size: args.chunk_size.unwrap_or(config.index.chunk_size),
        chunk_overlap: args.chunk_overlap.unwrap_or(config.index.chunk_overlap),
        min_chunk_size: config.index.min_chunk_size,
    };
    options.validate()?;

    let strategy = args.strategy.unwrap_or(config.index.strategy);
    let chunker = create_chunker(strategy);
    tracing::info!("parsing documents from {} ({strategy:?} chunker)", target_dir.display());

    let mut exclude = args.exclude.clone();
    exclude.extend_from_slice(&config.index.default_excludes);
    let files = walker::collect_files(
        target_dir,
        &args.include,
        &exclude,
        &config.index.default_extensions,
    );
    if files.is_empty() {
        println!("No documents found to index.");
    }

    let provider = create_provider(&config.embed)?;
    let mut store = LanceStore::new(db_path, &config.db.table_name, provider.dimensions())
        .with_batch_size(config.db.batch_size);

    let report = index_directory(
        &mut store,
        provider.as_ref(),
        chunker.as_ref(),
        &files,
        &options,
        args.clear,
    )
    .await?;

    println!(
        "Done. {} files found: {} indexed, {} unchanged, {} failed, {} removed ({} chunks written).",
        report.files_seen,
        report.files_indexed,
        report.files_unchanged,
        report.files_failed,
        report.files_removed,
        report.chunks_written,
    );
    match store.get_stats().await {
        Ok(stats) => println!("Total chunks in database: {}", stats.count),
        Err(AppError::NotInitialized(_)) => {}
        Err(e) => return Err(e),
    }

    Ok(())
}

/// Bring the store up to date with `files`.
///
/// A file is (re)indexed when its mtime differs from its File Index Record, or
/// unconditionally when `clear` is set. Its record is written only after its
/// rows are, so an interrupted run never hides a file from the next one.
/// Unreadable files and provider failures skip that file; store errors abort.
pub async fn index_directory(
    store: &mut dyn VectorStore,
    provider: &dyn EmbeddingProvider,
    chunker: &dyn Chunker,
    files: &[FileInfo],
    options: &ChunkerOptions,
    clear: bool,
) -> Result<IndexReport> {
    options.validate()?;
    store.initialize().await?;

    if clear {
        tracing::info!("clearing existing index");
        store.clear_database().await?;
        store.initialize().await?;
    }

    let mut report = IndexReport {
        files_seen: files.len(),
        ..IndexReport::default()
    };

    if !clear {
        report.files_removed = prune_deleted(store, files).await?;
    }

    let mut queued = Vec::new();
    for file in files {
        if clear || !store.is_file_indexed(&file.rel_path, file.mtime).await? {
            queued.push(file);
        } else {
            report.files_unchanged += 1;
        }
    }

    if queued.is_empty() {
        tracing::info!("all files are already indexed and up to date");
        return Ok(report);
    }
    tracing::info!(
        "found {} file(s) to index ({} already indexed)",
        queued.len(),
        report.files_unchanged
    );

    for file in queued {
        match index_file(store, provider, chunker, file, options, clear).await {
            Ok(written) => {
                report.files_indexed += 1;
                report.chunks_written += written;
            }
            Err(e) if e.is_per_file() => {
                tracing::warn!("skipping {}: {e}", file.rel_path);
                report.files_failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

/// Drop rows and records of indexed files that are no longer on disk.
async fn prune_deleted(store: &mut dyn VectorStore, files: &[FileInfo]) -> Result<usize> {
    let present: HashSet<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
    let mut gone: Vec<String> = store
        .get_indexed_files()
        .await?
        .into_keys()
        .filter(|p| !present.contains(p.as_str()))
        .collect();
    gone.sort();

    for path in &gone {
        store.remove_file_from_index(path).await?;
        tracing::info!("removed deleted file: {path}");
    }
    Ok(gone.len())
}

async fn index_file(
    store: &mut dyn VectorStore,
    provider: &dyn EmbeddingProvider,
    chunker: &dyn Chunker,
    file: &FileInfo,
    options: &ChunkerOptions,
    clear: bool,
) -> Result<usize> {
    let content = read_text(&file.path).await?;
    let chunks = chunker.chunk(&content, &file.rel_path, options);
    tracing::debug!(
        "{}: {} chunks (~{} tokens)",
        file.rel_path,
        chunks.len(),
        chunks.iter().map(|c| estimate_tokens(&c.text)).sum::<usize>()
    );

    // A clear run rebuilt the table already; there is nothing old to remove.
    if !clear {
        store.remove_file_from_index(&file.rel_path).await?;
    }
    let written = store.index_chunks(&chunks, provider).await?;
    store.mark_file_indexed(&file.rel_path, file.mtime).await?;

    tracing::info!("indexed: {} ({written} chunks)", file.rel_path);
    Ok(written)
}

/// Read a file as UTF-8, falling back to lossy decoding.
async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AppError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::warn!("{} is not valid UTF-8; decoding with replacement", path.display());
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}
