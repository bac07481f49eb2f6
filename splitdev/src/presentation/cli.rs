use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "splitdev CLI (alpha)", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log level filter when RUST_LOG is unset (e.g. "info", "split_core=debug")
    #[arg(long, global = true, default_value = "warn")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the buckets and catalog live. Flags override the config file.
#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// TOML store config (fan_out, backend, data_dir, catalog_path, read_mode)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// parent of the bucket1..bucketN directories
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// libsql catalog file
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    /// number of buckets every file is split across
    #[arg(long = "fan-out", global = true)]
    pub fan_out: Option<usize>,

    /// how downloads are read back
    #[arg(long = "read-mode", global = true, value_enum)]
    pub read_mode: Option<ReadModeArg>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReadModeArg {
    Buffered,
    Streaming,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a file (or a directory with --recursive) across the buckets
    Upload {
        src: PathBuf,
        /// recurse into directories, uploading every regular file
        #[arg(long)]
        recursive: bool,
    },

    /// Reassemble a file to an output path
    Download {
        id: i64,
        /// output path; defaults to the recorded file name in the current directory
        out: Option<PathBuf>,
    },

    /// Reassemble a file to stdout
    Cat { id: i64 },

    /// List catalog records
    Ls {
        /// show size and creation time
        #[arg(long)]
        long: bool,
    },

    /// Print the chunk map for one file
    Chunks { id: i64 },

    /// Apply catalog schema migrations
    Migrate {
        /// directory of NNNN_name.sql files; defaults to the embedded set
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
