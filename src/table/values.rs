use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;

use super::TableError;
use crate::types::{ColumnBuffer, LeafValue, StorageType};

/// Get a required column by name.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, TableError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
}

/// Read the value at `row` in its native storage type.
pub fn value_at(array: &dyn Array, row: usize) -> Result<LeafValue, TableError> {
    if row >= array.len() {
        return Err(TableError::RowOutOfBounds {
            row,
            len: array.len(),
        });
    }

    let value = match array.data_type() {
        DataType::Int64 => LeafValue::I64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt64 => LeafValue::U64(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Int32 => LeafValue::I32(array.as_primitive::<Int32Type>().value(row)),
        DataType::UInt32 => LeafValue::U32(array.as_primitive::<UInt32Type>().value(row)),
        DataType::Int16 => LeafValue::I16(array.as_primitive::<Int16Type>().value(row)),
        DataType::UInt16 => LeafValue::U16(array.as_primitive::<UInt16Type>().value(row)),
        DataType::Int8 => LeafValue::I8(array.as_primitive::<Int8Type>().value(row)),
        DataType::UInt8 => LeafValue::U8(array.as_primitive::<UInt8Type>().value(row)),
        DataType::Float64 => LeafValue::F64(array.as_primitive::<Float64Type>().value(row)),
        other => return Err(TableError::UnsupportedColumnType(other.to_string())),
    };
    Ok(value)
}

/// Re-pack one column of a window into a fresh contiguous buffer.
///
/// The buffer is allocated with room for `capacity` values (at least the
/// column length). When the column's Arrow type already matches `storage`
/// the values are copied in one slice copy; otherwise each value is cast.
pub fn stage_column(
    array: &dyn Array,
    storage: StorageType,
    capacity: usize,
) -> Result<ColumnBuffer, TableError> {
    let mut buffer = ColumnBuffer::with_capacity(storage, capacity.max(array.len()));

    let copied = match (&mut buffer, array.data_type()) {
        (ColumnBuffer::I64(v), DataType::Int64) => {
            v.extend_from_slice(array.as_primitive::<Int64Type>().values());
            true
        }
        (ColumnBuffer::U64(v), DataType::UInt64) => {
            v.extend_from_slice(array.as_primitive::<UInt64Type>().values());
            true
        }
        (ColumnBuffer::I32(v), DataType::Int32) => {
            v.extend_from_slice(array.as_primitive::<Int32Type>().values());
            true
        }
        (ColumnBuffer::U32(v), DataType::UInt32) => {
            v.extend_from_slice(array.as_primitive::<UInt32Type>().values());
            true
        }
        (ColumnBuffer::I16(v), DataType::Int16) => {
            v.extend_from_slice(array.as_primitive::<Int16Type>().values());
            true
        }
        (ColumnBuffer::U16(v), DataType::UInt16) => {
            v.extend_from_slice(array.as_primitive::<UInt16Type>().values());
            true
        }
        (ColumnBuffer::I8(v), DataType::Int8) => {
            v.extend_from_slice(array.as_primitive::<Int8Type>().values());
            true
        }
        (ColumnBuffer::U8(v), DataType::UInt8) => {
            v.extend_from_slice(array.as_primitive::<UInt8Type>().values());
            true
        }
        (ColumnBuffer::F64(v), DataType::Float64) => {
            v.extend_from_slice(array.as_primitive::<Float64Type>().values());
            true
        }
        _ => false,
    };

    if !copied {
        for row in 0..array.len() {
            buffer.push(value_at(array, row)?);
        }
    }
    Ok(buffer)
}
