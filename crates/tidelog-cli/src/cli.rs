use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tidelog",
    about = "Tidelog: object buckets over an append-only log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML store configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log file backing the bucket
    #[arg(long, global = true, default_value = "tidelog.wal")]
    pub log: PathBuf,

    /// Bucket to operate on, overriding the configuration
    #[arg(short, long, global = true)]
    pub bucket: Option<String>,

    /// Per-operation timeout in milliseconds, overriding the configuration
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store an object
    Put(PutArgs),
    /// Print an object's payload
    Get(KeyArgs),
    /// Show an object's record
    Info(KeyArgs),
    /// Delete an object
    Delete(KeyArgs),
    /// List live objects
    List,
    /// Show the bucket's watermark
    Watermark,
    /// Print the effective configuration
    Config,
    /// Run the put / list / delete / list cycle and check every listing
    Repro(ReproArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    /// Payload; read from --input when omitted
    pub value: Option<String>,
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ReproArgs {
    /// Number of objects to create
    #[arg(short = 'n', long, default_value = "100")]
    pub count: usize,
    /// Path segments per generated object name
    #[arg(long, default_value = "3")]
    pub depth: usize,
    /// Payload size in bytes
    #[arg(long, default_value = "32")]
    pub size: usize,
    /// Seed for generated names and payloads
    #[arg(long)]
    pub seed: Option<u64>,
    /// Use the file log instead of a process-local one
    #[arg(long)]
    pub durable: bool,
}
