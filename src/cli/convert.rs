use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;

use hittree::convert::{ConversionConfig, ConversionMode, HitTreeConverter, DEFAULT_CHUNK_SIZE};
use hittree::tree::CompressionType;

use super::config::Config;
use super::ModeArg;

/// Arguments of the convert command
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub mode: Option<ModeArg>,
    pub chunk_size: Option<usize>,
    pub config: Option<PathBuf>,
    pub compression_level: Option<i32>,
    pub row_group_size: Option<usize>,
    pub batch_size: Option<usize>,
}

/// Convert a table bundle into a tree file
pub fn run(args: ConvertArgs) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input bundle does not exist: {}", args.input.display());
    }

    let file_config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = build_config(&args, &file_config)?;

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hits".to_string());
        args.input.with_file_name(format!("{}.tree.parquet", stem))
    });

    info!("hittree - table bundle to tree");
    info!("==============================");
    info!("Input:  {}", args.input.display());
    info!("Output: {}", output.display());
    info!("Mode:   {}", config.mode);
    info!("Compression: {:?}", config.writer_config.compression);
    info!("Row group size: {}", config.writer_config.row_group_size);
    info!("Read batch size: {}", config.read_batch_size);

    let converter = HitTreeConverter::with_config(config);
    let stats = converter
        .convert(&args.input, &output)
        .context("Conversion failed")?;

    print_summary(&stats, &output);
    Ok(())
}

/// Merge flags, file values and defaults, in that order of precedence
fn build_config(args: &ConvertArgs, file: &Config) -> Result<ConversionConfig> {
    let mut config = ConversionConfig::default();

    let mode = args
        .mode
        .or(file.conversion.mode.map(ModeArg::from))
        .unwrap_or(ModeArg::Row);
    let chunk_size = args.chunk_size.or(file.conversion.chunk_size);
    config.mode = match mode {
        ModeArg::Row => {
            if chunk_size.is_some() {
                warn!("Chunk size is ignored in row mode");
            }
            ConversionMode::Row
        }
        ModeArg::Bulk => {
            let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
            if chunk_size <= 1 {
                anyhow::bail!("Bulk mode needs a chunk size above 1, got {}", chunk_size);
            }
            ConversionMode::Bulk { chunk_size }
        }
    };

    if let Some(rows) = args.batch_size.or(file.conversion.read_batch_size) {
        config.read_batch_size = rows;
    }
    if let Some(rows) = file.conversion.progress_interval {
        config.progress_interval = rows;
    }
    if let Some(name) = &file.conversion.hit_table {
        config.hit_table = name.clone();
    }
    if let Some(name) = &file.conversion.meta_table {
        config.meta_table = name.clone();
    }

    let mut writer = config.writer_config.clone();
    if let Some(level) = args.compression_level.or(file.output.compression_level) {
        if !(1..=22).contains(&level) {
            anyhow::bail!("ZSTD compression level must be within 1-22, got {}", level);
        }
        writer = writer.with_compression(CompressionType::Zstd(level));
    }
    if let Some(rows) = args.row_group_size.or(file.output.row_group_size) {
        writer = writer.with_row_group_size(rows);
    }
    if let Some(name) = &file.output.tree_name {
        writer = writer.with_tree_name(name.clone());
    }
    if let Some(title) = &file.output.tree_title {
        writer = writer.with_tree_title(title.clone());
    }
    config.writer_config = writer;

    Ok(config)
}

#[cfg(feature = "colorized_output")]
fn print_summary(stats: &hittree::convert::ConversionStats, output: &std::path::Path) {
    use console::style;

    println!("{}", style("Conversion complete").bold().green());
    println!("  {}: {}", style("Output").bold(), output.display());
    println!("  {}: {}", style("Hits").bold(), stats.hit_rows);
    println!("  {}: {}", style("Entries").bold(), stats.entries_written);
    println!("  {}: {}", style("Matched to meta").bold(), stats.matched_rows);
    if stats.chunks_written > 0 {
        println!("  {}: {}", style("Chunks").bold(), stats.chunks_written);
    }
    println!(
        "  {}: {} bytes ({:.2} MB)",
        style("File size").bold(),
        stats.output_file_size,
        stats.output_file_size as f64 / 1024.0 / 1024.0
    );
}

#[cfg(not(feature = "colorized_output"))]
fn print_summary(stats: &hittree::convert::ConversionStats, output: &std::path::Path) {
    println!("Conversion complete");
    println!("  Output: {}", output.display());
    println!("  Hits: {}", stats.hit_rows);
    println!("  Entries: {}", stats.entries_written);
    println!("  Matched to meta: {}", stats.matched_rows);
    if stats.chunks_written > 0 {
        println!("  Chunks: {}", stats.chunks_written);
    }
    println!(
        "  File size: {} bytes ({:.2} MB)",
        stats.output_file_size,
        stats.output_file_size as f64 / 1024.0 / 1024.0
    );
}
