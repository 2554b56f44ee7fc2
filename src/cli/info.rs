use anyhow::{Context, Result};
use std::path::PathBuf;

use hittree::tree::read_tree_info;

/// Display information about a tree file
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let info = read_tree_info(&file).context("Failed to read tree file")?;

    println!("hittree File Information");
    println!("========================");
    println!("File: {}", file.display());
    println!();

    println!("Tree:");
    println!("  Name: {}", info.name);
    println!("  Title: {}", info.title);
    println!("  Format version: {}", info.format_version);
    if let Some(created) = &info.created {
        println!("  Created: {}", created);
    }
    println!();

    println!("File Statistics:");
    println!("  Entries: {}", info.entries);
    println!("  Row groups: {}", info.row_groups);
    println!(
        "  File size: {} bytes ({:.2} MB)",
        info.file_size_bytes,
        info.file_size_bytes as f64 / 1024.0 / 1024.0
    );
    println!();

    println!("Branches:");
    if info.branches.is_empty() {
        println!("  <none recorded>");
    }
    for (i, branch) in info.branches.iter().enumerate() {
        println!("  {:3}. {}", i + 1, branch.leaflist);
    }

    Ok(())
}
