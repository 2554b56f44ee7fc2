//! # Input Tables
//!
//! The converter reads two event-indexed column tables: the hit table and the
//! meta (timing) table. This module defines the [`ColumnTable`] interface the
//! conversion engines use, plus the concrete stores shipped with the crate:
//!
//! - [`ParquetTable`]: one Parquet file (or in-memory Parquet bytes) per table
//! - [`MemoryTable`]: an Arrow `RecordBatch` held in memory
//! - [`TableBundle`]: a directory of `<table>.parquet` files, the on-disk
//!   equivalent of one multi-table input file
//!
//! ## Example
//!
//! ```rust,no_run
//! use hittree::table::{ColumnTable, TableBundle};
//!
//! let bundle = TableBundle::open("run_52_interpreted")?;
//! let hits = bundle.table("Hits")?;
//! println!("{} hits", hits.num_rows());
//! for column in hits.columns() {
//!     println!("  {} ({})", column.name, column.type_name);
//! }
//! # Ok::<(), hittree::table::TableError>(())
//! ```

mod batches;
mod bundle;
mod error;
mod memory;
mod parquet_table;
mod values;


use arrow::datatypes::Field;
use arrow::record_batch::RecordBatch;

use crate::types::{arrow_type_name, resolve_name, TypeInfo, UnsupportedTypeError};

pub use batches::RecordBatchIterator;
pub use bundle::TableBundle;
pub use error::TableError;
pub use memory::MemoryTable;
pub use parquet_table::ParquetTable;
pub use values::{column, stage_column, value_at};

/// Name of the hit table inside a bundle
pub const HIT_TABLE: &str = "Hits";
/// Name of the meta (timing) table inside a bundle
pub const META_TABLE: &str = "meta_data";
/// Join key shared by the hit and meta tables
pub const EVENT_NUMBER: &str = "event_number";
/// Arrow field metadata key that overrides the semantic type of a column
pub const SEMANTIC_TYPE_KEY: &str = "semantic_type";

/// Name and semantic type of one input column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Column name
    pub name: String,
    /// Semantic type name (e.g. `uint16`, `float64`)
    pub type_name: String,
}

impl ColumnDesc {
    /// Create a column description
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Describe an Arrow field.
    ///
    /// The `semantic_type` field metadata entry wins over the Arrow data type,
    /// which lets a table declare types Arrow has no native name for
    /// (`ufloat64`) or that the converter must reject (`complex128`).
    pub fn from_field(field: &Field) -> Self {
        let type_name = field
            .metadata()
            .get(SEMANTIC_TYPE_KEY)
            .cloned()
            .unwrap_or_else(|| arrow_type_name(field.data_type()));
        Self::new(field.name().clone(), type_name)
    }

    /// Resolve this column's type through the type table
    pub fn resolve(&self) -> Result<TypeInfo, UnsupportedTypeError> {
        resolve_name(&self.type_name)
    }
}

/// A named, read-only table of typed columns.
///
/// Implementations must return rows in storage order; both tables handed to
/// the converter are expected to be sorted by `event_number`.
pub trait ColumnTable {
    /// Table name
    fn name(&self) -> &str;

    /// Column names and semantic types, in table order
    fn columns(&self) -> Vec<ColumnDesc>;

    /// Total number of rows
    fn num_rows(&self) -> usize;

    /// Read rows `[start, stop)` as a single batch
    fn read_range(&self, start: usize, stop: usize) -> Result<RecordBatch, TableError>;

    /// Stream all rows lazily in batches of at most `batch_size` rows
    fn iter_batches(&self, batch_size: usize) -> Result<RecordBatchIterator, TableError>;
}

pub(crate) fn check_range(
    table: &str,
    start: usize,
    stop: usize,
    num_rows: usize,
) -> Result<(), TableError> {
    if start > stop || stop > num_rows {
        return Err(TableError::InvalidRange {
            table: table.to_string(),
            start,
            stop,
            num_rows,
        });
    }
    Ok(())
}
