use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use glob::Pattern;
use walkdir::WalkDir;

/// A file eligible for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    /// Path relative to the walked root; the key for chunks and File Index Records
    pub rel_path: String,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: i64,
}

/// Collect all indexable files under `root`, sorted by relative path.
///
/// If `include` globs are provided, only files matching at least one pattern are kept.
/// If no include globs are given, files whose extension is in `default_exts` are kept.
/// Files matching any `exclude` glob are always dropped.
/// Hidden directories (starting with `.`) are skipped.
pub fn collect_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
    default_exts: &[String],
) -> Vec<FileInfo> {
    let include_patterns: Vec<Pattern> = include
        .iter()
        .filter_map(|g| Pattern::new(g).ok())
        .collect();
    let exclude_patterns: Vec<Pattern> = exclude
        .iter()
        .filter_map(|g| Pattern::new(g).ok())
        .collect();

    let mut files: Vec<FileInfo> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() > 0 && e.file_type().is_dir() {
                let name = e.file_name().to_str().unwrap_or("");
                if name.starts_with('.') {
                    return false;
                }
                // Prune directories covered by any exclude pattern
                let rel = e.path().strip_prefix(root).unwrap_or(e.path());
                let probe = format!("{}/x", rel.to_string_lossy());
                if exclude_patterns.iter().any(|p| p.matches(&probe)) {
                    return false;
                }
            }
            true
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(root).unwrap_or(path);
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            if exclude_patterns.iter().any(|p| p.matches(&rel_str)) {
                return None;
            }

            if !include_patterns.is_empty() {
                if !include_patterns.iter().any(|p| p.matches(&rel_str)) {
                    return None;
                }
            } else {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !default_exts.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    return None;
                }
            }

            let Some(modified) = e.metadata().ok().and_then(|m| m.modified().ok()) else {
                tracing::warn!("cannot stat {}; skipping", path.display());
                return None;
            };
            let mtime = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            Some(FileInfo {
                path: path.to_path_buf(),
                rel_path: rel_str,
                mtime,
            })
        })
        .collect();

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}
