//! # hittree
//!
//! Command-line converter from interpreted hit and meta tables to a tree file.
//!
//! ## Usage
//!
//! ```bash
//! # One entry per hit, joined with event timestamps
//! hittree convert run_52_interpreted run_52.tree.parquet
//!
//! # One entry per 50000 hits
//! hittree convert run_52_interpreted --mode bulk --chunk-size 50000
//!
//! # Synthetic input and file inspection
//! hittree demo demo_interpreted
//! hittree info run_52.tree.parquet
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
