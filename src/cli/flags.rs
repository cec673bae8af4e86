use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::pipeline::reporter::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "falcon-verify",
    version,
    about = "Checks whether a captured page's domain belongs to the brand it shows"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML). Default: config/falcon-verify.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Allow-list file (rank,domain per line); overrides the config
    #[arg(long, global = true)]
    pub allowlist: Option<PathBuf>,

    /// Deadline for one whole verification, in milliseconds
    #[arg(long, global = true)]
    pub deadline_ms: Option<u64>,

    /// Increase verbosity (debug, trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path
    #[arg(long, default_value = "data/falcon-verify.log", global = true)]
    pub log_file: String,

    /// Output format
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormatArg>,

    /// Write results to this file instead of stdout
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify one brand claim against one URL
    Verify {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        url: String,
        /// Optional file with the page HTML
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Verify a capture payload ({url, html, screenshot, brand?} JSON)
    Analyze {
        #[arg(long)]
        capture: PathBuf,
    },
    /// Verify many captures, one JSON payload per line
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Concurrent verifications; overrides the config
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormatArg {
    Json,
    Jsonl,
    Records,
    Csv,
    Markdown,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
            OutputFormatArg::Records => OutputFormat::Records,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}
