//! # Type Mapping
//!
//! Translates the semantic numeric type of an input column into the two
//! facets the output side needs: the leaf type tag declared on a tree branch
//! and the native storage type used for record members and chunk buffers.
//!
//! Both facets come from a single table ([`resolve`]) so the branch tag and
//! the storage width of a column can never disagree.
//!
//! | semantic name(s) | leaf tag | storage |
//! |------------------|----------|---------|
//! | `int64` | `L` | `i64` |
//! | `uint64` | `l` | `u64` |
//! | `int32` | `I` | `i32` |
//! | `uint32` | `i` | `u32` |
//! | `int16` | `S` | `i16` |
//! | `uint16` | `s` | `u16` |
//! | `int8` | `B` | `i8` |
//! | `uint8` | `b` | `u8` |
//! | `float64`, `double` | `D` | `f64` |
//! | `ufloat64`, `udouble` | `d` | `f64` |

mod buffer;
mod value;


use std::fmt;
use std::str::FromStr;

use arrow::datatypes::DataType;

pub use buffer::ColumnBuffer;
pub use value::LeafValue;

/// Error returned when a column's semantic type has no entry in the type table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported column type: {type_name}")]
pub struct UnsupportedTypeError {
    /// The semantic type name as reported by the input table
    pub type_name: String,
}

impl UnsupportedTypeError {
    /// Create an error for the given type name
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

/// Logical numeric type of an input column, independent of its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// 64-bit float (`float64` / `double`)
    Float64,
    /// 64-bit float carrying the unsigned tag (`ufloat64` / `udouble`)
    UFloat64,
}

impl SemanticType {
    /// Canonical name of the type
    pub fn name(&self) -> &'static str {
        match self {
            SemanticType::Int64 => "int64",
            SemanticType::UInt64 => "uint64",
            SemanticType::Int32 => "int32",
            SemanticType::UInt32 => "uint32",
            SemanticType::Int16 => "int16",
            SemanticType::UInt16 => "uint16",
            SemanticType::Int8 => "int8",
            SemanticType::UInt8 => "uint8",
            SemanticType::Float64 => "float64",
            SemanticType::UFloat64 => "ufloat64",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SemanticType {
    type Err = UnsupportedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int64" => Ok(SemanticType::Int64),
            "uint64" => Ok(SemanticType::UInt64),
            "int32" => Ok(SemanticType::Int32),
            "uint32" => Ok(SemanticType::UInt32),
            "int16" => Ok(SemanticType::Int16),
            "uint16" => Ok(SemanticType::UInt16),
            "int8" => Ok(SemanticType::Int8),
            "uint8" => Ok(SemanticType::UInt8),
            "float64" | "double" => Ok(SemanticType::Float64),
            "ufloat64" | "udouble" => Ok(SemanticType::UFloat64),
            other => Err(UnsupportedTypeError::new(other)),
        }
    }
}

/// Leaf type tag declared on an output branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafType {
    /// 64-bit signed (`L`)
    Long64,
    /// 64-bit unsigned (`l`)
    ULong64,
    /// 32-bit signed (`I`)
    Int,
    /// 32-bit unsigned (`i`)
    UInt,
    /// 16-bit signed (`S`)
    Short,
    /// 16-bit unsigned (`s`)
    UShort,
    /// 8-bit signed (`B`)
    Char,
    /// 8-bit unsigned (`b`)
    UChar,
    /// 64-bit float (`D`)
    Double,
    /// 64-bit float, unsigned-tagged (`d`)
    UDouble,
}

impl LeafType {
    /// Single-character code used in leaf list strings such as `tot/b`
    pub fn code(&self) -> char {
        match self {
            LeafType::Long64 => 'L',
            LeafType::ULong64 => 'l',
            LeafType::Int => 'I',
            LeafType::UInt => 'i',
            LeafType::Short => 'S',
            LeafType::UShort => 's',
            LeafType::Char => 'B',
            LeafType::UChar => 'b',
            LeafType::Double => 'D',
            LeafType::UDouble => 'd',
        }
    }
}

/// Native storage width and signedness of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// `i64`
    I64,
    /// `u64`
    U64,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `i16`
    I16,
    /// `u16`
    U16,
    /// `i8`
    I8,
    /// `u8`
    U8,
    /// `f64`
    F64,
}

impl StorageType {
    /// Size of one value in bytes
    pub const fn width(&self) -> usize {
        match self {
            StorageType::I64 | StorageType::U64 | StorageType::F64 => 8,
            StorageType::I32 | StorageType::U32 => 4,
            StorageType::I16 | StorageType::U16 => 2,
            StorageType::I8 | StorageType::U8 => 1,
        }
    }

    /// Arrow data type used when this storage is written to a Parquet tree
    pub fn arrow_type(&self) -> DataType {
        match self {
            StorageType::I64 => DataType::Int64,
            StorageType::U64 => DataType::UInt64,
            StorageType::I32 => DataType::Int32,
            StorageType::U32 => DataType::UInt32,
            StorageType::I16 => DataType::Int16,
            StorageType::U16 => DataType::UInt16,
            StorageType::I8 => DataType::Int8,
            StorageType::U8 => DataType::UInt8,
            StorageType::F64 => DataType::Float64,
        }
    }
}

/// Both facets of a resolved semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// The semantic type that was resolved
    pub semantic: SemanticType,
    /// Branch leaf tag
    pub leaf: LeafType,
    /// Native storage type
    pub storage: StorageType,
}

/// Resolve a semantic type into its leaf tag and storage type.
pub fn resolve(semantic: SemanticType) -> TypeInfo {
    let (leaf, storage) = match semantic {
        SemanticType::Int64 => (LeafType::Long64, StorageType::I64),
        SemanticType::UInt64 => (LeafType::ULong64, StorageType::U64),
        SemanticType::Int32 => (LeafType::Int, StorageType::I32),
        SemanticType::UInt32 => (LeafType::UInt, StorageType::U32),
        SemanticType::Int16 => (LeafType::Short, StorageType::I16),
        SemanticType::UInt16 => (LeafType::UShort, StorageType::U16),
        SemanticType::Int8 => (LeafType::Char, StorageType::I8),
        SemanticType::UInt8 => (LeafType::UChar, StorageType::U8),
        SemanticType::Float64 => (LeafType::Double, StorageType::F64),
        SemanticType::UFloat64 => (LeafType::UDouble, StorageType::F64),
    };
    TypeInfo {
        semantic,
        leaf,
        storage,
    }
}

/// Resolve a semantic type given by name.
///
/// # Example
///
/// ```
/// use hittree::types::{resolve_name, LeafType, StorageType};
///
/// let info = resolve_name("uint16").unwrap();
/// assert_eq!(info.leaf, LeafType::UShort);
/// assert_eq!(info.storage, StorageType::U16);
/// assert!(resolve_name("complex128").is_err());
/// ```
pub fn resolve_name(type_name: &str) -> Result<TypeInfo, UnsupportedTypeError> {
    type_name.parse::<SemanticType>().map(resolve)
}

/// Semantic type name reported for an Arrow column without explicit metadata.
pub fn arrow_type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Int64 => "int64".to_string(),
        DataType::UInt64 => "uint64".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::UInt32 => "uint32".to_string(),
        DataType::Int16 => "int16".to_string(),
        DataType::UInt16 => "uint16".to_string(),
        DataType::Int8 => "int8".to_string(),
        DataType::UInt8 => "uint8".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::Boolean => "bool".to_string(),
        other => other.to_string().to_lowercase(),
    }
}
