use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::buffer::ScalarBuffer;

use super::{LeafValue, StorageType};

/// Contiguous, column-major storage for one output field.
///
/// In bulk mode one buffer is allocated per field and per window with a
/// capacity of `chunk_size`; only the first `len()` slots hold data.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnBuffer {
    /// `i64` values
    I64(Vec<i64>),
    /// `u64` values
    U64(Vec<u64>),
    /// `i32` values
    I32(Vec<i32>),
    /// `u32` values
    U32(Vec<u32>),
    /// `i16` values
    I16(Vec<i16>),
    /// `u16` values
    U16(Vec<u16>),
    /// `i8` values
    I8(Vec<i8>),
    /// `u8` values
    U8(Vec<u8>),
    /// `f64` values
    F64(Vec<f64>),
}

macro_rules! with_vec {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            ColumnBuffer::I64($v) => $body,
            ColumnBuffer::U64($v) => $body,
            ColumnBuffer::I32($v) => $body,
            ColumnBuffer::U32($v) => $body,
            ColumnBuffer::I16($v) => $body,
            ColumnBuffer::U16($v) => $body,
            ColumnBuffer::I8($v) => $body,
            ColumnBuffer::U8($v) => $body,
            ColumnBuffer::F64($v) => $body,
        }
    };
}

impl ColumnBuffer {
    /// Allocate an empty buffer able to hold `capacity` values without reallocating
    pub fn with_capacity(storage: StorageType, capacity: usize) -> Self {
        match storage {
            StorageType::I64 => ColumnBuffer::I64(Vec::with_capacity(capacity)),
            StorageType::U64 => ColumnBuffer::U64(Vec::with_capacity(capacity)),
            StorageType::I32 => ColumnBuffer::I32(Vec::with_capacity(capacity)),
            StorageType::U32 => ColumnBuffer::U32(Vec::with_capacity(capacity)),
            StorageType::I16 => ColumnBuffer::I16(Vec::with_capacity(capacity)),
            StorageType::U16 => ColumnBuffer::U16(Vec::with_capacity(capacity)),
            StorageType::I8 => ColumnBuffer::I8(Vec::with_capacity(capacity)),
            StorageType::U8 => ColumnBuffer::U8(Vec::with_capacity(capacity)),
            StorageType::F64 => ColumnBuffer::F64(Vec::with_capacity(capacity)),
        }
    }

    /// Storage type of the values held
    pub fn storage_type(&self) -> StorageType {
        match self {
            ColumnBuffer::I64(_) => StorageType::I64,
            ColumnBuffer::U64(_) => StorageType::U64,
            ColumnBuffer::I32(_) => StorageType::I32,
            ColumnBuffer::U32(_) => StorageType::U32,
            ColumnBuffer::I16(_) => StorageType::I16,
            ColumnBuffer::U16(_) => StorageType::U16,
            ColumnBuffer::I8(_) => StorageType::I8,
            ColumnBuffer::U8(_) => StorageType::U8,
            ColumnBuffer::F64(_) => StorageType::F64,
        }
    }

    /// Number of values held
    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    /// Whether the buffer holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated capacity in values
    pub fn capacity(&self) -> usize {
        with_vec!(self, v => v.capacity())
    }

    /// Append a value, casting it to this buffer's storage type
    pub fn push(&mut self, value: LeafValue) {
        let value = value.cast(self.storage_type());
        match (self, value) {
            (ColumnBuffer::I64(v), LeafValue::I64(x)) => v.push(x),
            (ColumnBuffer::U64(v), LeafValue::U64(x)) => v.push(x),
            (ColumnBuffer::I32(v), LeafValue::I32(x)) => v.push(x),
            (ColumnBuffer::U32(v), LeafValue::U32(x)) => v.push(x),
            (ColumnBuffer::I16(v), LeafValue::I16(x)) => v.push(x),
            (ColumnBuffer::U16(v), LeafValue::U16(x)) => v.push(x),
            (ColumnBuffer::I8(v), LeafValue::I8(x)) => v.push(x),
            (ColumnBuffer::U8(v), LeafValue::U8(x)) => v.push(x),
            (ColumnBuffer::F64(v), LeafValue::F64(x)) => v.push(x),
            _ => unreachable!("cast matches buffer storage"),
        }
    }

    /// Value at `index`
    pub fn get(&self, index: usize) -> Option<LeafValue> {
        match self {
            ColumnBuffer::I64(v) => v.get(index).copied().map(LeafValue::I64),
            ColumnBuffer::U64(v) => v.get(index).copied().map(LeafValue::U64),
            ColumnBuffer::I32(v) => v.get(index).copied().map(LeafValue::I32),
            ColumnBuffer::U32(v) => v.get(index).copied().map(LeafValue::U32),
            ColumnBuffer::I16(v) => v.get(index).copied().map(LeafValue::I16),
            ColumnBuffer::U16(v) => v.get(index).copied().map(LeafValue::U16),
            ColumnBuffer::I8(v) => v.get(index).copied().map(LeafValue::I8),
            ColumnBuffer::U8(v) => v.get(index).copied().map(LeafValue::U8),
            ColumnBuffer::F64(v) => v.get(index).copied().map(LeafValue::F64),
        }
    }

    /// Iterate over the held values
    pub fn iter(&self) -> impl Iterator<Item = LeafValue> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Keep only the first `len` values
    pub fn truncate(&mut self, len: usize) {
        with_vec!(self, v => v.truncate(len))
    }

    /// Drop all values, keeping the allocation
    pub fn clear(&mut self) {
        with_vec!(self, v => v.clear())
    }

    /// Append all values of `other`.
    ///
    /// Returns `false` (and appends nothing) when the storage types differ.
    pub fn append(&mut self, other: &ColumnBuffer) -> bool {
        match (self, other) {
            (ColumnBuffer::I64(a), ColumnBuffer::I64(b)) => a.extend_from_slice(b),
            (ColumnBuffer::U64(a), ColumnBuffer::U64(b)) => a.extend_from_slice(b),
            (ColumnBuffer::I32(a), ColumnBuffer::I32(b)) => a.extend_from_slice(b),
            (ColumnBuffer::U32(a), ColumnBuffer::U32(b)) => a.extend_from_slice(b),
            (ColumnBuffer::I16(a), ColumnBuffer::I16(b)) => a.extend_from_slice(b),
            (ColumnBuffer::U16(a), ColumnBuffer::U16(b)) => a.extend_from_slice(b),
            (ColumnBuffer::I8(a), ColumnBuffer::I8(b)) => a.extend_from_slice(b),
            (ColumnBuffer::U8(a), ColumnBuffer::U8(b)) => a.extend_from_slice(b),
            (ColumnBuffer::F64(a), ColumnBuffer::F64(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    /// Hand the buffer's allocation to an Arrow array without copying.
    pub fn into_array(self) -> ArrayRef {
        match self {
            ColumnBuffer::I64(v) => Arc::new(Int64Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::U64(v) => Arc::new(UInt64Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::I32(v) => Arc::new(Int32Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::U32(v) => Arc::new(UInt32Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::I16(v) => Arc::new(Int16Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::U16(v) => Arc::new(UInt16Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::I8(v) => Arc::new(Int8Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::U8(v) => Arc::new(UInt8Array::new(ScalarBuffer::from(v), None)),
            ColumnBuffer::F64(v) => Arc::new(Float64Array::new(ScalarBuffer::from(v), None)),
        }
    }
}
