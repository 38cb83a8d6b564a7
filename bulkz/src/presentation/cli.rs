use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Parallel streaming compressor for large files",
    long_about = None
)]
pub struct Cli {
    /// Directory to scan recursively
    #[arg(required_unless_present = "files", conflicts_with = "files")]
    pub target: Option<PathBuf>,

    /// Compress exactly these files instead of scanning a directory
    #[arg(long, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Skip files smaller than this many MB (discovery only)
    #[arg(long = "min-size", value_name = "MB", default_value_t = 10)]
    pub min_size_mb: u64,

    /// Streaming chunk size in KB
    #[arg(long = "chunk-size", value_name = "KB", default_value_t = 64,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size_kb: u64,

    /// Worker threads (defaults to the number of CPU cores)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Compression level, clamped to the codec's range
    #[arg(long, default_value_t = 3)]
    pub level: i32,

    /// Delete each original after its output is verified
    #[arg(long)]
    pub delete_original: bool,

    /// Skip the round-trip integrity check
    #[arg(long)]
    pub no_verify: bool,

    /// Write outputs here instead of next to each input
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Only consider these extensions (e.g. .log csv)
    #[arg(long = "include-ext", value_name = "EXT", num_args = 1..)]
    pub include_ext: Vec<String>,

    /// Ignore these extensions; replaces the built-in exclude list
    #[arg(long = "exclude-ext", value_name = "EXT", num_args = 1..)]
    pub exclude_ext: Option<Vec<String>>,

    /// Append per-file failures to this file
    #[arg(long, value_name = "PATH", default_value = "compression_errors.log")]
    pub error_log: PathBuf,

    /// Write a JSON report of the run
    #[arg(long, value_name = "PATH")]
    pub json_report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
