use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const FILE_NAME: &str = "file_index.json";

/// File Index Records: last-indexed mtime per file path.
///
/// Persisted as a JSON side-file next to the chunk table when a path is
/// given; purely in memory otherwise. Every mutation is flushed before it
/// returns.
#[derive(Debug, Default)]
pub struct FileIndex {
    path: Option<PathBuf>,
    records: BTreeMap<String, i64>,
}

#[derive(Serialize, Deserialize)]
struct OnDisk {
    files: BTreeMap<String, i64>,
}

impl FileIndex {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load records from `path`, starting empty if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let records = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<OnDisk>(&raw)?.files,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            records,
        })
    }

    pub fn get(&self, file_path: &str) -> Option<i64> {
        self.records.get(file_path).copied()
    }

    pub fn is_current(&self, file_path: &str, mtime: i64) -> bool {
        self.get(file_path) == Some(mtime)
    }

    pub fn all(&self) -> HashMap<String, i64> {
        self.records.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn mark(&mut self, file_path: &str, mtime: i64) -> Result<()> {
        self.records.insert(file_path.to_string(), mtime);
        self.flush()
    }

    pub fn remove(&mut self, file_path: &str) -> Result<()> {
        if self.records.remove(file_path).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        match &self.path {
            Some(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            None => Ok(()),
        }
    }

    // Atomic replace via a sibling temp file.
    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&OnDisk {
            files: self.records.clone(),
        })?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
