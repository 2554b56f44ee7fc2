use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod config;
mod convert;
mod demo;
mod info;

/// hittree - convert interpreted hit and meta tables into a tree file
#[derive(Parser)]
#[command(name = "hittree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output layout of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One entry per hit with its event's timestamps
    Row,
    /// One entry per chunk of hits, fields stored as arrays
    Bulk,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a table bundle (Hits + meta_data) into a tree file
    Convert {
        /// Input table bundle directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output tree file path (defaults to <INPUT>.tree.parquet)
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Output layout (row or bulk)
        #[arg(short = 'm', long, value_enum)]
        mode: Option<ModeArg>,

        /// Hits per entry in bulk mode
        #[arg(short = 'n', long)]
        chunk_size: Option<usize>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Compression level for ZSTD (1-22)
        #[arg(short = 'c', long)]
        compression_level: Option<i32>,

        // === Advanced tuning flags (hidden from --help) ===
        /// Row group size (tree entries per row group)
        #[arg(short = 'r', long, hide = true)]
        row_group_size: Option<usize>,

        /// Rows read per batch from the input tables
        #[arg(short = 'b', long, hide = true)]
        batch_size: Option<usize>,
    },

    /// Generate a synthetic table bundle for testing
    Demo {
        /// Output bundle directory
        #[arg(value_name = "OUTPUT", default_value = "demo_interpreted")]
        output: PathBuf,

        /// Number of events to generate
        #[arg(short = 'e', long, default_value = "1000")]
        events: usize,
    },

    /// Display information about a tree file
    Info {
        /// Input tree file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            mode,
            chunk_size,
            config,
            compression_level,
            row_group_size,
            batch_size,
        } => convert::run(convert::ConvertArgs {
            input,
            output,
            mode,
            chunk_size,
            config,
            compression_level,
            row_group_size,
            batch_size,
        }),
        Commands::Demo { output, events } => demo::run(output, events),
        Commands::Info { file } => info::run(file),
    }
}
