//! # hittree - Hit Table to Tree Converter
//!
//! `hittree` converts the interpreted output of a pixel detector readout,
//! two event-indexed column tables, into a single row-oriented tree for
//! downstream analysis:
//!
//! - the **hit** table (`Hits`): one row per pixel hit, high rate;
//! - the **meta** table (`meta_data`): one row per readout, carrying the
//!   start and stop timestamps of each event.
//!
//! Both tables are sorted by a non-decreasing `event_number`.
//!
//! ## Key Features
//!
//! - **Schema from data**: output branches are derived from the input
//!   columns through one type table; no per-field code.
//!
//! - **Row mode**: a streaming merge join writes one entry per hit, each
//!   carrying its event's timestamps, through statically laid-out records.
//!
//! - **Bulk mode**: one entry per window of hits, every field stored as a
//!   column-major run of values sized by an `n_entries` branch.
//!
//! - **Parquet in, Parquet out**: input tables are Parquet files (or Arrow
//!   record batches); the tree is a Parquet file whose footer records the
//!   tree name, title and branch leaf lists.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hittree::convert::{ConversionConfig, ConversionMode, HitTreeConverter};
//!
//! let converter = HitTreeConverter::with_config(
//!     ConversionConfig::default().with_mode(ConversionMode::Row),
//! );
//! let stats = converter.convert("run_52_interpreted", "run_52.tree.parquet")?;
//! println!("{}", stats);
//! # Ok::<(), hittree::convert::ConversionError>(())
//! ```
//!
//! The input is a directory of tables:
//! ```text
//! run_52_interpreted/
//! ├── Hits.parquet
//! └── meta_data.parquet
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: semantic type table, scalar values and column buffers
//! - [`table`]: input tables (Parquet files, table bundles, in-memory batches)
//! - [`record`]: packed output records for row mode
//! - [`tree`]: output tree, branch bindings and entry sinks
//! - [`schema`]: output schema derivation and branch registration
//! - [`convert`]: row-mode merge join, bulk chunk writer and the converter

// Documentation lints
#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod convert;
pub mod record;
pub mod schema;
pub mod table;
pub mod tree;
pub mod types;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::convert::{
        ChunkedBulkWriter, ConversionConfig, ConversionError, ConversionMode, ConversionStats,
        HitTreeConverter, MergeJoinEngine,
    };
    pub use crate::record::{BoundRecord, HitInfo, MetaInfo, OutputRecord};
    pub use crate::schema::{OutputSchema, SchemaBuilder, SchemaError};
    pub use crate::table::{ColumnTable, MemoryTable, ParquetTable, TableBundle, TableError};
    pub use crate::tree::{
        read_tree_info, CompressionType, MemorySink, ParquetSink, Tree, TreeError, TreeFile,
        TreeWriterConfig,
    };
    pub use crate::types::{resolve_name, LeafType, SemanticType, StorageType, UnsupportedTypeError};
}
