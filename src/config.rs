use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkStrategy;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub embed: EmbedConfig,
    pub db: DbConfig,
    pub index: IndexConfig,
}

/// Which embedding service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Openai,
    Voyageai,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Openai => "openai",
            ProviderKind::Voyageai => "voyageai",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint
    pub base_url: Option<String>,
    /// Falls back to OPENAI_API_KEY / VOYAGE_API_KEY
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Known output width; otherwise adopted from the first response
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
    /// Parallel requests for providers without a batch endpoint
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Name of the table within LanceDB that stores chunks
    pub table_name: String,
    /// Chunks embedded per provider call
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub strategy: ChunkStrategy,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks shorter than this are dropped (unless a file yields only one)
    pub min_chunk_size: Option<usize>,
    /// File extensions to auto-include when no --include glob is given
    pub default_extensions: Vec<String>,
    /// Glob patterns for paths to exclude from indexing
    pub default_excludes: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            embed: EmbedConfig {
                provider: ProviderKind::Ollama,
                model: "nomic-embed-text".into(),
                base_url: None,
                api_key: None,
                dimensions: None,
                timeout_secs: 60,
                concurrency: crate::embed::DEFAULT_CONCURRENCY,
            },
            db: DbConfig {
                table_name: "documents".into(),
                batch_size: crate::db::DEFAULT_BATCH_SIZE,
            },
            index: IndexConfig {
                strategy: ChunkStrategy::Lines,
                chunk_size: 1000,
                chunk_overlap: 200,
                min_chunk_size: None,
                default_extensions: vec![
                    "md".into(),
                    "markdown".into(),
                    "txt".into(),
                    "rst".into(),
                    "adoc".into(),
                    "org".into(),
                    "html".into(),
                    "json".into(),
                    "yaml".into(),
                    "yml".into(),
                    "toml".into(),
                ],
                default_excludes: vec![
                    "**/node_modules/**".into(),
                    "**/target/**".into(),
                    "**/build/**".into(),
                    "**/dist/**".into(),
                    "**/vendor/**".into(),
                    // project config
                    "folio.toml".into(),
                ],
            },
        }
    }
}

/// Returns the default global config path: ~/.folio/folio.toml
pub fn global_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".folio")
        .join("folio.toml")
}

/// Returns the LanceDB directory path for a given target directory.
/// The database lives at <target_dir>/.folio/db (a directory, not a file).
pub fn db_path(target_dir: &Path) -> PathBuf {
    target_dir.join(".folio").join("db")
}

/// Ensures the global config file exists, creating it with defaults on first launch.
pub fn ensure_global_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_GLOBAL_CONFIG)?;
    Ok(())
}

const DEFAULT_GLOBAL_CONFIG: &str = r#"# folio global configuration
# This file was created automatically. Edit as needed.
# Project-level overrides go in folio.toml in the project directory.

[embed]
provider = "ollama"          # ollama | openai | voyageai
model = "nomic-embed-text"
# base_url = "http://localhost:11434"
# api_key = "..."            # or OPENAI_API_KEY / VOYAGE_API_KEY
# dimensions = 768           # otherwise taken from the first response
timeout_secs = 60
concurrency = 5

[db]
table_name = "documents"
batch_size = 100

[index]
strategy = "lines"           # lines | character
chunk_size = 1000
chunk_overlap = 200
default_extensions = ["md", "markdown", "txt", "rst", "adoc", "org", "html", "json", "yaml", "yml", "toml"]
default_excludes = [
    "**/node_modules/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/vendor/**",
    "folio.toml",
]
"#;

/// Load configuration using figment's layered system:
/// 1. Built-in defaults (AppConfig::default)
/// 2. Global config file (~/.folio/folio.toml), silently ignored if missing
/// 3. Project config file (<target-dir>/folio.toml), only merged if Some
/// 4. Environment variables prefixed with FOLIO_ (nested with __)
///    e.g. FOLIO_EMBED__PROVIDER=openai
pub fn load(global_config: &Path, project_config: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(global_config));

    if let Some(proj) = project_config {
        figment = figment.merge(Toml::file(proj));
    }

    let config = figment
        .merge(Env::prefixed("FOLIO_").split("__"))
        .extract()?;

    Ok(config)
}
