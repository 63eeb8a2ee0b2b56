use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::cli::{OutputFormat, QueryArgs};
use crate::config::AppConfig;
use crate::db::store::LanceStore;
use crate::db::{SearchResult, VectorStore};
use crate::embed::{EmbeddingProvider, create_provider};
use crate::error::{AppError, Result};

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;

const RULE_WIDTH: usize = 60;

#[derive(Serialize)]
struct JsonResult<'a> {
    rank: usize,
    id: &'a str,
    file_path: &'a str,
    start_line: u32,
    end_line: u32,
    distance: f32,
    text: &'a str,
}

pub async fn run(config: &AppConfig, db_path: &Path, args: QueryArgs) -> Result<()> {
    let provider = create_provider(&config.embed)?;
    let mut store = LanceStore::new(db_path, &config.db.table_name, provider.dimensions());

    let results = query_database(&mut store, provider.as_ref(), &args.prompt, args.top_k).await?;

    match args.format {
        OutputFormat::Text => print!("{}", format_results(&results)),
        OutputFormat::Json => {
            let json: Vec<JsonResult> = results
                .iter()
                .enumerate()
                .map(|(i, r)| JsonResult {
                    rank: i + 1,
                    id: &r.chunk.id,
                    file_path: &r.chunk.chunk.file_path,
                    start_line: r.chunk.chunk.start_line,
                    end_line: r.chunk.chunk.end_line,
                    distance: r.distance,
                    text: &r.chunk.chunk.text,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

/// Embed `query` once and return the `top_k` nearest chunks, nearest first.
///
/// The store's dimensionality wins over the provider's: a query vector of any
/// other length is rejected before it reaches the engine.
pub async fn query_database(
    store: &mut dyn VectorStore,
    provider: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchResult>> {
    store.initialize().await?;
    if !store.has_table() {
        return Err(AppError::NotInitialized(
            "no documents have been indexed yet; run `folio index` first".into(),
        ));
    }
    let expected = store.dimensions();

    tracing::debug!("embedding query with {}", provider.name());
    let vector = provider.embed(query).await?;
    if vector.len() != expected {
        return Err(AppError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }

    store.search(&vector, top_k).await
}

/// Render results as numbered blocks separated by a horizontal rule.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.\n".to_string();
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "Found {} results:\n", results.len());
    for (i, r) in results.iter().enumerate() {
        let c = &r.chunk.chunk;
        let span = if c.start_line == c.end_line {
            format!("line {}", c.start_line)
        } else {
            format!("lines {}-{}", c.start_line, c.end_line)
        };
        let _ = writeln!(out, "[{}] {} ({span})", i + 1, c.file_path);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", c.text.trim_end());
        let _ = writeln!(out);
    }
    out
}
