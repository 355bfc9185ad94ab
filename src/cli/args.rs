//! Command line argument parsing for the pagedex CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// pagedex - a paged, disk-based inverted index
#[derive(Parser, Debug, Clone)]
#[command(name = "pagedex")]
#[command(about = "Build and query a paged, disk-based inverted index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PagedexArgs {
    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PagedexArgs {
    /// Effective verbosity: 0 quiet, 1 normal, 2 verbose, 3+ debug.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Index every file of a directory, one document per file
    Index(IndexArgs),

    /// Query an index
    Search(SearchArgs),

    /// Show per-segment statistics
    Stats(StatsArgs),

    /// Merge all segments pairwise
    Merge(MergeArgs),
}

/// Arguments for indexing a directory
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,

    /// Directory of documents; files are read in name order
    #[arg(value_name = "DOCS_DIR")]
    pub docs_dir: PathBuf,

    /// Store token positions (enables phrase queries)
    #[arg(long)]
    pub positional: bool,

    /// Page size in bytes; defaults to the existing index's page size
    #[arg(long, value_name = "BYTES")]
    pub page_size: Option<usize>,

    /// Buffered documents that trigger a flush
    #[arg(long, value_name = "DOCS")]
    pub flush_threshold: Option<usize>,

    /// Segment count that triggers a merge (even)
    #[arg(long, value_name = "SEGMENTS")]
    pub merge_threshold: Option<usize>,
}

/// Query evaluation modes
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Documents containing every keyword
    And,
    /// Documents containing any keyword
    Or,
    /// Documents containing the keywords as consecutive tokens
    Phrase,
    /// Documents ranked by TF-IDF cosine similarity
    Tfidf,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,

    /// Query keywords
    #[arg(value_name = "QUERY", required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Query mode
    #[arg(short, long, default_value = "and")]
    pub mode: SearchMode,

    /// Maximum number of ranked results (tfidf mode)
    #[arg(short = 'k', long, default_value = "10")]
    pub top_k: usize,

    /// Link graph (`source target` per line) to blend PageRank into tfidf
    /// scores; documents are identified by their first line
    #[arg(long, value_name = "EDGES_FILE")]
    pub links: Option<PathBuf>,

    /// Weight of the PageRank score when --links is given
    #[arg(long, default_value = "1.0")]
    pub rank_weight: f64,

    /// PageRank iterations when --links is given
    #[arg(long, default_value = "20")]
    pub iterations: usize,
}

/// Arguments for index statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,
}

/// Arguments for merging
#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
