//! # Output Schema
//!
//! Derives the output layout from the columns of the input tables and
//! registers it on a tree, without any per-field code:
//!
//! - every hit column becomes one field with its mapped leaf and storage type;
//! - of the meta columns only `timestamp_start` and `timestamp_stop` are kept,
//!   in table order;
//! - in chunked (bulk) mode every field is repeated, sized by an `n_entries`
//!   count branch that is declared first;
//! - in row mode, when output records are supplied, each branch is bound to
//!   the record member of the same name; fields of a table without a record
//!   stay unbound.
//!
//! All column types are resolved and all record members are looked up
//! before the first branch is declared, so a failing build never leaves a
//! partial schema on the tree.

mod builder;
mod error;


use crate::tree::{BranchId, Repeat};
use crate::types::{LeafType, SemanticType, StorageType};

pub use builder::SchemaBuilder;
pub use error::SchemaError;

/// Name of the count branch of a chunked tree
pub const CHUNK_SIZE_FIELD: &str = "n_entries";
/// Meta column carrying the readout start time
pub const TIMESTAMP_START: &str = "timestamp_start";
/// Meta column carrying the readout stop time
pub const TIMESTAMP_STOP: &str = "timestamp_stop";
/// Meta columns copied to the output
pub const META_FIELDS: [&str; 2] = [TIMESTAMP_START, TIMESTAMP_STOP];

/// Input table an output field is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// The hit table
    Hit,
    /// The meta (timing) table
    Meta,
}

/// One field of the output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    /// Field (and branch) name
    pub name: String,
    /// Semantic type of the source column
    pub semantic: SemanticType,
    /// Leaf type tag of the branch
    pub leaf: LeafType,
    /// Storage type of each value
    pub storage: StorageType,
    /// Repetition in chunked mode
    pub repeat: Option<Repeat>,
    /// Table the values come from
    pub source: FieldSource,
    /// Branch registered for the field, once built
    pub branch: Option<BranchId>,
    /// Index of the bound record member, when records are bound
    pub member: Option<usize>,
}

/// Ordered output fields, fixed once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputSchema {
    fields: Vec<OutputField>,
    chunk_size: usize,
}

impl OutputSchema {
    /// Fields in declaration order
    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    /// Number of fields (the count branch is not a field)
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field with this name
    pub fn field(&self, name: &str) -> Option<&OutputField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Fields taken from one table
    pub fn fields_from(&self, source: FieldSource) -> impl Iterator<Item = &OutputField> {
        self.fields.iter().filter(move |f| f.source == source)
    }

    /// Rows per entry the schema was built for
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether fields are repeated per entry
    pub fn is_chunked(&self) -> bool {
        self.chunk_size > 1
    }
}
