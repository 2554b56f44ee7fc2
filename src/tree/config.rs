use std::collections::BTreeMap;

use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

/// Default tree name
pub const DEFAULT_TREE_NAME: &str = "Table";
/// Default tree title
pub const DEFAULT_TREE_TITLE: &str = "Converted HDF5 table";

/// Compression options for tree files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// ZSTD compression at the given level
    Zstd(i32),
    /// Snappy compression (faster, larger files)
    Snappy,
    /// No compression
    Uncompressed,
}

impl Default for CompressionType {
    fn default() -> Self {
        Self::Zstd(3)
    }
}

impl CompressionType {
    /// Parquet codec for this setting
    pub fn to_parquet(&self) -> Compression {
        match self {
            CompressionType::Zstd(level) => {
                Compression::ZSTD(ZstdLevel::try_new(*level).unwrap_or_default())
            }
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

/// Configuration for writing a tree to a Parquet file
#[derive(Debug, Clone)]
pub struct TreeWriterConfig {
    /// Tree name stored in the footer
    pub tree_name: String,

    /// Tree title stored in the footer
    pub tree_title: String,

    /// Compression type to use
    pub compression: CompressionType,

    /// Maximum rows per Parquet row group
    pub row_group_size: usize,

    /// Data page size in bytes
    pub data_page_size: usize,

    /// Whether to write column statistics
    pub write_statistics: bool,

    /// Entries buffered before a record batch is handed to the writer
    pub batch_entries: usize,

    /// Values (summed over all branches) buffered before a record batch is
    /// handed to the writer; bounds memory for chunked trees whose entries
    /// carry many values each
    pub batch_values: usize,
}

impl Default for TreeWriterConfig {
    fn default() -> Self {
        Self {
            tree_name: DEFAULT_TREE_NAME.to_string(),
            tree_title: DEFAULT_TREE_TITLE.to_string(),
            compression: CompressionType::Zstd(3),
            row_group_size: 1_000_000,
            data_page_size: 1024 * 1024,
            write_statistics: true,
            batch_entries: 65_536,
            batch_values: 4 * 1024 * 1024,
        }
    }
}

impl TreeWriterConfig {
    /// Configuration optimized for fast writing (larger files)
    pub fn fast_write() -> Self {
        Self {
            compression: CompressionType::Snappy,
            write_statistics: false,
            ..Self::default()
        }
    }

    /// Configuration optimized for maximum compression (slower write)
    pub fn max_compression() -> Self {
        Self {
            compression: CompressionType::Zstd(19),
            row_group_size: 4_000_000,
            data_page_size: 2 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Set the tree name
    pub fn with_tree_name(mut self, name: impl Into<String>) -> Self {
        self.tree_name = name.into();
        self
    }

    /// Set the tree title
    pub fn with_tree_title(mut self, title: impl Into<String>) -> Self {
        self.tree_title = title.into();
        self
    }

    /// Set the compression
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Set the row group size
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    /// Set the entry and value limits of one buffered batch
    pub fn with_batch_limits(mut self, entries: usize, values: usize) -> Self {
        self.batch_entries = entries.max(1);
        self.batch_values = values.max(1);
        self
    }

    /// Create writer properties carrying the given footer metadata
    pub(super) fn to_writer_properties(&self, metadata: &BTreeMap<String, String>) -> WriterProperties {
        let statistics = if self.write_statistics {
            EnabledStatistics::Chunk
        } else {
            EnabledStatistics::None
        };

        let kv_metadata: Vec<KeyValue> = metadata
            .iter()
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: Some(v.clone()),
            })
            .collect();

        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_data_page_size_limit(self.data_page_size)
            .set_statistics_enabled(statistics)
            .set_max_row_group_size(self.row_group_size.max(1))
            .set_key_value_metadata(Some(kv_metadata))
            .build()
    }
}
