use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::chunker::text::CharacterChunker;
use crate::chunker::lines::LineChunker;
use crate::test_support::{FailingEmbedder, HashEmbedder, MemoryStore, row};

const DIMS: usize = 8;

fn options() -> ChunkerOptions {
    ChunkerOptions {
        chunk_size: 100,
        chunk_overlap: 20,
        min_chunk_size: None,
    }
}

fn write(dir: &Path, name: &str, content: &str, mtime: i64) -> FileInfo {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write file");
    FileInfo {
        path,
        rel_path: name.to_string(),
        mtime,
    }
}

fn rows_for<'a>(store: &'a MemoryStore, file: &str) -> Vec<&'a str> {
    store
        .rows()
        .iter()
        .filter(|r| r.chunk.file_path == file)
        .map(|r| r.id.as_str())
        .collect()
}

#[tokio::test]
async fn character_windows_land_in_the_store() {
    let dir = TempDir::new().unwrap();
    let files = vec![write(dir.path(), "a.txt", &"x".repeat(250), 1)];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    let report = index_directory(&mut store, &provider, &CharacterChunker, &files, &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.chunks_written, 4);
    assert_eq!(store.rows().len(), 4);
    assert_eq!(store.get_indexed_files().await.unwrap()["a.txt"], 1);
}

#[tokio::test]
async fn unchanged_files_are_not_embedded_again() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.txt", &"alpha ".repeat(40), 10),
        write(dir.path(), "b.txt", "beta\ngamma\n", 20),
    ];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();
    let embedded = provider.texts_embedded();
    let rows = store.rows().len();

    let report = index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();

    assert_eq!(provider.texts_embedded(), embedded);
    assert_eq!(store.rows().len(), rows);
    assert_eq!(report.files_unchanged, 2);
    assert_eq!(report.files_indexed, 0);
    assert_eq!(report.chunks_written, 0);
}

#[tokio::test]
async fn modified_file_rows_are_replaced() {
    let dir = TempDir::new().unwrap();
    let first = vec![
        write(dir.path(), "a.txt", &"a".repeat(250), 1),
        write(dir.path(), "b.txt", "unchanged", 1),
    ];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    index_directory(&mut store, &provider, &CharacterChunker, &first, &options(), false)
        .await
        .unwrap();
    assert_eq!(rows_for(&store, "a.txt").len(), 4);

    let second = vec![
        write(dir.path(), "a.txt", &"a".repeat(90), 2),
        first[1].clone(),
    ];
    let report = index_directory(&mut store, &provider, &CharacterChunker, &second, &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_unchanged, 1);
    assert_eq!(rows_for(&store, "a.txt"), vec!["a.txt:1:1"]);
    assert_eq!(rows_for(&store, "b.txt").len(), 1);
    assert_eq!(store.get_indexed_files().await.unwrap()["a.txt"], 2);
}

#[tokio::test]
async fn clear_rebuilds_to_the_same_count() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.txt", &"word ".repeat(100), 1),
        write(dir.path(), "b.txt", &"line\n".repeat(60), 1),
    ];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    index_directory(&mut store, &provider, &LineChunker, &files, &options(), true)
        .await
        .unwrap();
    let first = store.rows().len();
    let report = index_directory(&mut store, &provider, &LineChunker, &files, &options(), true)
        .await
        .unwrap();

    assert!(first > 0);
    assert_eq!(store.rows().len(), first);
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.files_unchanged, 0);
}

#[tokio::test]
async fn provider_failure_skips_only_that_file() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.txt", "plain text", 1),
        write(dir.path(), "b.txt", "contains POISON here", 1),
        write(dir.path(), "c.txt", "more plain text", 1),
    ];
    let mut store = MemoryStore::new(DIMS);
    let failing = FailingEmbedder {
        inner: HashEmbedder::new(DIMS),
        marker: "POISON",
    };

    let report = index_directory(&mut store, &failing, &LineChunker, &files, &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.files_failed, 1);
    assert!(rows_for(&store, "b.txt").is_empty());
    let indexed = store.get_indexed_files().await.unwrap();
    assert!(indexed.contains_key("a.txt"));
    assert!(!indexed.contains_key("b.txt"));

    // The unmarked file is picked up by the next run
    let provider = HashEmbedder::new(DIMS);
    let report = index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_unchanged, 2);
    assert_eq!(rows_for(&store, "b.txt").len(), 1);
}

#[tokio::test]
async fn unreadable_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.txt", "readable", 1),
        FileInfo {
            path: dir.path().join("missing.txt"),
            rel_path: "missing.txt".into(),
            mtime: 1,
        },
    ];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    let report = index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_failed, 1);
    assert!(!store.get_indexed_files().await.unwrap().contains_key("missing.txt"));
}

#[tokio::test]
async fn deleted_files_are_pruned() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.txt", "kept", 1),
        write(dir.path(), "b.txt", "going away", 1),
    ];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);
    index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();

    let report = index_directory(&mut store, &provider, &LineChunker, &files[..1], &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_removed, 1);
    assert!(rows_for(&store, "b.txt").is_empty());
    assert_eq!(rows_for(&store, "a.txt").len(), 1);
    let indexed = store.get_indexed_files().await.unwrap();
    assert_eq!(indexed.keys().collect::<Vec<_>>(), vec!["a.txt"]);
}

#[tokio::test]
async fn invalid_utf8_is_decoded_lossily() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bin.txt");
    std::fs::write(&path, [b'o', b'k', 0xff, b'!']).unwrap();
    let files = vec![FileInfo {
        path,
        rel_path: "bin.txt".into(),
        mtime: 1,
    }];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);

    let report = index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap();

    assert_eq!(report.files_indexed, 1);
    assert!(store.rows()[0].chunk.text.starts_with("ok\u{fffd}"));
}

#[tokio::test]
async fn table_dimension_mismatch_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let files = vec![write(dir.path(), "new.txt", "fresh content", 1)];
    let existing = vec![row("old.txt", 1, "old", 512, 0.5)];
    let mut store = MemoryStore::with_rows(DIMS, existing);
    let provider = HashEmbedder::new(DIMS);

    let err = index_directory(&mut store, &provider, &LineChunker, &files, &options(), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::DimensionMismatch {
            expected: 512,
            actual: DIMS
        }
    ));
    assert!(rows_for(&store, "new.txt").is_empty());
    assert!(!store.get_indexed_files().await.unwrap().contains_key("new.txt"));
}

#[tokio::test]
async fn invalid_options_are_rejected_before_touching_the_store() {
    let dir = TempDir::new().unwrap();
    let files = vec![write(dir.path(), "a.txt", "text", 1)];
    let mut store = MemoryStore::new(DIMS);
    let provider = HashEmbedder::new(DIMS);
    let bad = ChunkerOptions {
        chunk_size: 10,
        chunk_overlap: 10,
        min_chunk_size: None,
    };

    assert!(
        index_directory(&mut store, &provider, &LineChunker, &files, &bad, false)
            .await
            .is_err()
    );
    assert_eq!(provider.texts_embedded(), 0);
    assert!(!store.has_table());
}
