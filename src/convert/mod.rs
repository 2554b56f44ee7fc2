//! # Conversion
//!
//! Turns a hit table and a meta table into one output tree, in one of two
//! modes:
//!
//! - **Row mode** ([`MergeJoinEngine`]): one entry per hit, each carrying the
//!   timestamps of its event, written through shared output records.
//! - **Bulk mode** ([`ChunkedBulkWriter`]): one entry per window of
//!   `chunk_size` hits, each field stored as a run of values sized by the
//!   `n_entries` branch.
//!
//! [`HitTreeConverter`] wires a table bundle on disk to a tree file and runs
//! one of the modes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hittree::convert::{ConversionConfig, ConversionMode, HitTreeConverter};
//!
//! let config = ConversionConfig::default().with_mode(ConversionMode::Bulk { chunk_size: 10_000 });
//! let stats = HitTreeConverter::with_config(config)
//!     .convert("run_52_interpreted", "run_52.tree.parquet")?;
//! println!("{}", stats);
//! # Ok::<(), hittree::convert::ConversionError>(())
//! ```

mod bulk;
mod merge;

#[cfg(test)]
mod tests;

use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::record::RecordError;
use crate::schema::SchemaError;
use crate::table::{ColumnTable, TableBundle, TableError, HIT_TABLE, META_TABLE};
use crate::tree::{EntrySink, Tree, TreeError, TreeFile, TreeWriterConfig};

pub use bulk::ChunkedBulkWriter;
pub use merge::{CursorState, MergeJoinEngine, MetaCursor};

/// Rows read per batch when streaming a table
pub const DEFAULT_READ_BATCH_SIZE: usize = 65_536;
/// Hits between two progress messages
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1_000_000;
/// Hits per entry used by the command line when bulk mode has no explicit size
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Errors that can occur during conversion
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Reading an input table failed
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// The output schema could not be built
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Writing the tree failed
    #[error("Tree error: {0}")]
    TreeError(#[from] TreeError),

    /// Accessing an output record failed
    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid conversion settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// How hits are laid out in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    /// One entry per hit, joined with meta timestamps
    #[default]
    Row,
    /// One entry per window of `chunk_size` hits
    Bulk {
        /// Hits per entry, greater than 1
        chunk_size: usize,
    },
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Row => f.write_str("row"),
            ConversionMode::Bulk { chunk_size } => write!(f, "bulk (chunk size {})", chunk_size),
        }
    }
}

/// Configuration for a conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Output layout
    pub mode: ConversionMode,

    /// Rows read per batch when streaming hits (row mode) and meta rows
    pub read_batch_size: usize,

    /// Hits between two progress messages
    pub progress_interval: usize,

    /// Name of the hit table in the bundle
    pub hit_table: String,

    /// Name of the meta table in the bundle
    pub meta_table: String,

    /// Tree file settings
    pub writer_config: TreeWriterConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::Row,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            hit_table: HIT_TABLE.to_string(),
            meta_table: META_TABLE.to_string(),
            writer_config: TreeWriterConfig::default(),
        }
    }
}

impl ConversionConfig {
    /// Configuration optimized for fast writing (larger files)
    pub fn fast_write() -> Self {
        Self {
            writer_config: TreeWriterConfig::fast_write(),
            ..Self::default()
        }
    }

    /// Configuration optimized for maximum compression (slower write)
    pub fn max_compression() -> Self {
        Self {
            writer_config: TreeWriterConfig::max_compression(),
            ..Self::default()
        }
    }

    /// Set the output layout
    pub fn with_mode(mut self, mode: ConversionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the read batch size
    pub fn with_read_batch_size(mut self, rows: usize) -> Self {
        self.read_batch_size = rows;
        self
    }

    /// Set the progress interval
    pub fn with_progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = rows;
        self
    }

    /// Set the tree file settings
    pub fn with_writer_config(mut self, writer_config: TreeWriterConfig) -> Self {
        self.writer_config = writer_config;
        self
    }
}

/// Statistics from a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Hit rows read
    pub hit_rows: u64,
    /// Hit rows whose event had a meta row
    pub matched_rows: u64,
    /// Meta rows read by the cursor
    pub meta_rows_consumed: u64,
    /// Tree entries filled
    pub entries_written: u64,
    /// Chunks written in bulk mode
    pub chunks_written: u64,
    /// Output file size in bytes, when written to a file
    pub output_file_size: u64,
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Converted {} hits into {} entries ({} matched to meta data)",
            self.hit_rows, self.entries_written, self.matched_rows
        )
    }
}

/// Converter from a hit/meta table bundle to a tree file
#[derive(Debug, Clone, Default)]
pub struct HitTreeConverter {
    config: ConversionConfig,
}

impl HitTreeConverter {
    /// Create a converter with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a converter with custom configuration
    pub fn with_config(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert the tables of one bundle into a tree file.
    ///
    /// A partially written output file is removed when the conversion fails.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<ConversionStats, ConversionError> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            "Converting {} to {} ({} mode)",
            input_path.display(),
            output_path.display(),
            self.config.mode
        );

        let bundle = TableBundle::open(input_path)?;
        let hits = bundle.table(&self.config.hit_table)?;
        let meta = if bundle.has_table(&self.config.meta_table) {
            Some(bundle.table(&self.config.meta_table)?)
        } else {
            None
        };

        let result = TreeFile::create(output_path, self.config.writer_config.clone())
            .map_err(ConversionError::from)
            .and_then(|mut tree| {
                let stats = self.convert_tables(
                    &hits,
                    meta.as_ref().map(|m| m as &dyn ColumnTable),
                    &mut tree,
                )?;
                let (_, tree_stats) = tree.close()?;
                info!("Tree finalized: {}", tree_stats);
                Ok(stats)
            });

        let mut stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                if output_path.exists() {
                    warn!(
                        "Conversion failed, removing partial output {}",
                        output_path.display()
                    );
                    if let Err(remove_err) = fs::remove_file(output_path) {
                        warn!("Could not remove {}: {}", output_path.display(), remove_err);
                    }
                }
                return Err(e);
            }
        };

        stats.output_file_size = fs::metadata(output_path)?.len();
        info!("Conversion complete: {}", stats);
        info!("  Output size: {} bytes", stats.output_file_size);
        Ok(stats)
    }

    /// Run the configured mode on already opened tables
    pub fn convert_tables<S: EntrySink>(
        &self,
        hits: &dyn ColumnTable,
        meta: Option<&dyn ColumnTable>,
        tree: &mut Tree<S>,
    ) -> Result<ConversionStats, ConversionError> {
        match self.config.mode {
            ConversionMode::Row => {
                let meta = meta.ok_or_else(|| {
                    ConversionError::TableError(TableError::TableNotFound(
                        self.config.meta_table.clone(),
                    ))
                })?;
                MergeJoinEngine::new()
                    .with_read_batch_size(self.config.read_batch_size)
                    .with_progress_interval(self.config.progress_interval)
                    .run(hits, meta, tree)
            }
            ConversionMode::Bulk { chunk_size } => ChunkedBulkWriter::new(chunk_size)?
                .with_meta_batch_size(self.config.read_batch_size)
                .with_progress_interval(self.config.progress_interval)
                .run(hits, meta, tree),
        }
    }
}
