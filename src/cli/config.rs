//! TOML configuration file support.
//!
//! Settings that would otherwise need several flags can live in a file:
//!
//! ```toml
//! # hittree.toml
//! [conversion]
//! mode = "bulk"
//! chunk_size = 50000
//! read_batch_size = 65536
//!
//! [output]
//! compression_level = 9
//! tree_name = "Table"
//! ```
//!
//! Command line flags win over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::ModeArg;

/// Root configuration structure for hittree.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Conversion settings.
    #[serde(default)]
    pub conversion: ConversionSection,

    /// Tree file settings.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[conversion]` section.
#[derive(Debug, Default, Deserialize)]
pub struct ConversionSection {
    /// `row` or `bulk`.
    pub mode: Option<ModeSetting>,

    /// Hits per entry in bulk mode.
    pub chunk_size: Option<usize>,

    /// Rows read per batch from the input tables.
    pub read_batch_size: Option<usize>,

    /// Hits between two progress messages.
    pub progress_interval: Option<usize>,

    /// Name of the hit table in the bundle.
    pub hit_table: Option<String>,

    /// Name of the meta table in the bundle.
    pub meta_table: Option<String>,
}

/// `[output]` section.
#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    /// ZSTD compression level (1-22).
    pub compression_level: Option<i32>,

    /// Tree entries per Parquet row group.
    pub row_group_size: Option<usize>,

    /// Tree name written to the footer.
    pub tree_name: Option<String>,

    /// Tree title written to the footer.
    pub tree_title: Option<String>,
}

/// Mode as spelled in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Row,
    Bulk,
}

impl From<ModeSetting> for ModeArg {
    fn from(mode: ModeSetting) -> Self {
        match mode {
            ModeSetting::Row => ModeArg::Row,
            ModeSetting::Bulk => ModeArg::Bulk,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
