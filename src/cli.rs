use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::chunker::ChunkStrategy;

/// folio: semantic search over a directory of documents
#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Index documents into a local vector database and search them by meaning",
    long_about = None
)]
pub struct Cli {
    /// Path to a TOML configuration file
    /// (default: ~/.folio/folio.toml)
    #[arg(short, long, global = true, env = "FOLIO_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target document directory (default: current working directory)
    #[arg(short = 'D', long = "dir", global = true, value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and store new or changed documents
    Index(IndexArgs),

    /// Find the chunks nearest to a natural-language prompt
    Query(QueryArgs),

    /// Inspect or manage the vector database
    Db(DbArgs),

    /// Print the resolved configuration as JSON and exit
    Config,
}

#[derive(Args, Debug, Default)]
pub struct IndexArgs {
    /// File glob patterns to include (repeatable, e.g. --include 'docs/*.md')
    #[arg(short, long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// File glob patterns to exclude (repeatable)
    #[arg(short = 'x', long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Drop the existing index and rebuild it from scratch
    #[arg(long)]
    pub clear: bool,

    /// Maximum characters per chunk (overrides index.chunk_size)
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks (overrides index.chunk_overlap)
    #[arg(long, value_name = "N")]
    pub chunk_overlap: Option<usize>,

    /// Chunking strategy (overrides index.strategy)
    #[arg(long, value_enum)]
    pub strategy: Option<ChunkStrategy>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Natural language query to search for
    pub prompt: String,

    /// Maximum number of results to show
    #[arg(short = 'k', long, default_value_t = 5)]
    pub top_k: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub action: DbAction,
}

#[derive(Subcommand, Debug)]
pub enum DbAction {
    /// Show index statistics (chunk count, file count, dimensionality)
    Stats,
    /// List indexed files with their recorded modification times
    Files,
    /// Remove all indexed data (requires --yes)
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
