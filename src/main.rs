mod chunker;
mod cli;
mod config;
mod db;
mod embed;
mod error;
mod indexer;
mod query;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, DbAction};
use db::VectorStore;
use db::store::LanceStore;
use error::AppError;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    fmt().with_env_filter(EnvFilter::new(filter)).init();

    // 1. Resolve target directory
    let target_dir = match cli.target_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot read current directory")?,
    };

    // 2. Resolve global config path (overridable via --config)
    let global_cfg_path = cli.config.unwrap_or_else(config::global_config_path);

    // 3. Auto-create global config on first launch
    config::ensure_global_config(&global_cfg_path)?;

    // 4. Probe for project config in target dir (optional, never auto-created)
    let project_cfg_path = target_dir.join("folio.toml");
    let project_cfg = project_cfg_path.exists().then_some(project_cfg_path.as_path());

    // 5. Load layered config
    let cfg = config::load(&global_cfg_path, project_cfg)?;

    // 6. Compute DB path from target dir
    let db_path = config::db_path(&target_dir);

    match cli.command {
        Commands::Index(args) => {
            indexer::run(&cfg, &db_path, &target_dir, args).await?;
        }
        Commands::Query(args) => {
            query::run(&cfg, &db_path, args).await?;
        }
        Commands::Db(args) => {
            // Dimensionality comes from the table; the declared width is only a placeholder
            let declared = cfg.embed.dimensions.unwrap_or(0);
            let mut store = LanceStore::new(&db_path, &cfg.db.table_name, declared);
            match args.action {
                DbAction::Stats if !db_path.exists() => {
                    println!("No index found. Run `index` first.")
                }
                DbAction::Stats => {
                    store.initialize().await?;
                    match store.get_stats().await {
                        Err(AppError::NotInitialized(_)) => {
                            println!("No index found. Run `index` first.")
                        }
                        Err(e) => return Err(e.into()),
                        Ok(stats) => {
                            let files = store.get_indexed_files().await?.len();
                            println!("Files indexed : {files}");
                            println!("Total chunks  : {}", stats.count);
                            println!("Embedding dim : {}", store.dimensions());
                        }
                    }
                }
                DbAction::Files => {
                    store.initialize().await?;
                    let mut files: Vec<_> = store.get_indexed_files().await?.into_iter().collect();
                    if files.is_empty() {
                        println!("No files indexed.");
                    }
                    files.sort();
                    for (path, mtime) in files {
                        println!("{mtime:>15}  {path}");
                    }
                }
                DbAction::Clear { yes } => {
                    if !yes {
                        println!("Pass --yes to confirm clearing all indexed data.");
                    } else if !db_path.exists() {
                        println!("No index found. Nothing to clear.");
                    } else {
                        store.initialize().await?;
                        store.clear_database().await?;
                        println!("Index cleared.");
                    }
                }
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
