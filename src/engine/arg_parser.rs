use clap::Parser;
use std::path::PathBuf;

/// Parallel bulk loader for delimited text files.
#[derive(Clone, Debug, Parser)]
#[command(name = "batchload")]
#[command(about = "Load a CSV file into a database table using concurrent batching workers.")]
pub struct Cli {
    /// Source file; the first record is the header. Default: from the config file.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Target table. Its columns must include every header column.
    #[arg(long, short)]
    pub table: Option<String>,

    /// Database path. Prompted for when not given here, in the config file, or in BATCHLOAD_DB.
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Config file. Default: batchload.toml in the current directory, if present.
    #[arg(long, short = 'C')]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Rows per batch (one transaction each).
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Record queue capacity. Default: twice the worker count.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Stop the whole run at the first failed batch instead of continuing.
    #[arg(long)]
    pub abort_on_error: bool,

    /// Use one INSERT per row instead of buffered multi-row inserts.
    #[arg(long)]
    pub row_inserts: bool,

    /// Roll back any batch that takes longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub batch_timeout: Option<u64>,

    /// Open the database with a SQLCipher key (BATCHLOAD_DB_KEY, .env, or prompt).
    #[arg(long, short = 'x')]
    pub encrypt: bool,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
