use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cluster::{ClusterMethod, KeyingFunction};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Cluster, transform and pseudonymize CSV data with replayable history",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Preview the first rows of a CSV file as parsed and typed by the engine
    Preview(PreviewArgs),
    /// Propose clusters of near-duplicate values in one column, optionally merging them
    Cluster(ClusterArgs),
    /// Run a YAML/JSON recipe of operations and write the result with its history
    Transform(TransformArgs),
    /// Rebuild a table by replaying a saved history against its original input
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output CSV file (stdout if omitted or `-`)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to the output extension, then the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Column whose values are clustered
    #[arg(short = 'c', long = "column")]
    pub column: String,
    /// Clustering method
    #[arg(long, value_enum, default_value_t = ClusterMethod::Fingerprint)]
    pub method: ClusterMethod,
    /// Phonetic keying function for the metaphone method
    #[arg(long = "keying", value_enum, default_value_t = KeyingFunction::Metaphone)]
    pub keying: KeyingFunction,
    /// Similarity threshold in [0, 1] for the levenshtein method
    #[arg(long, default_value_t = crate::cluster::DEFAULT_THRESHOLD)]
    pub threshold: f64,
    /// Character n-gram size for the ngram-fingerprint method
    #[arg(long = "ngram-size", default_value_t = crate::keys::DEFAULT_NGRAM_SIZE)]
    pub ngram_size: usize,
    /// Merge every proposed cluster into its first value and write the table
    #[arg(long)]
    pub apply: bool,
    #[command(flatten)]
    pub target: OutputArgs,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Recipe file (.yaml/.yml for YAML, otherwise JSON)
    #[arg(short = 'r', long = "recipe")]
    pub recipe: PathBuf,
    #[command(flatten)]
    pub target: OutputArgs,
    /// Write the pseudonym map (column -> original -> pseudonym) as JSON
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Write the operation history as JSON for later replay
    #[arg(long = "history")]
    pub history: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// History file written by `transform --history`
    #[arg(long = "history")]
    pub history: PathBuf,
    /// Replay up to this operation index instead of the saved cursor (-1 for the original table)
    #[arg(long, allow_negative_numbers = true)]
    pub cursor: Option<i64>,
    #[command(flatten)]
    pub target: OutputArgs,
    /// Write the pseudonym map of the replayed state as JSON
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    let named = match value.to_ascii_lowercase().as_str() {
        "tab" | "\\t" => Some(b'\t'),
        "comma" => Some(b','),
        "pipe" => Some(b'|'),
        "semicolon" => Some(b';'),
        _ => None,
    };
    if let Some(delimiter) = named {
        return Ok(delimiter);
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Err("Delimiter cannot be empty".to_string()),
        (Some(_), Some(_)) => Err("Delimiter must be a single character".to_string()),
        (Some(ch), None) if ch.is_ascii() => Ok(ch as u8),
        (Some(_), None) => Err("Delimiter must be ASCII".to_string()),
    }
}
