use super::StorageType;

/// A single scalar in one of the supported storage types.
///
/// Conversions between storage types follow Rust `as` semantics: integers
/// wrap per two's complement when narrowed, floats saturate when converted
/// to integers. No overflow is reported; a value that does not fit its
/// target width is silently truncated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeafValue {
    /// `i64` value
    I64(i64),
    /// `u64` value
    U64(u64),
    /// `i32` value
    I32(i32),
    /// `u32` value
    U32(u32),
    /// `i16` value
    I16(i16),
    /// `u16` value
    U16(u16),
    /// `i8` value
    I8(i8),
    /// `u8` value
    U8(u8),
    /// `f64` value
    F64(f64),
}

impl LeafValue {
    /// Zero of the given storage type
    pub fn zero(storage: StorageType) -> Self {
        LeafValue::I64(0).cast(storage)
    }

    /// Storage type of this value
    pub fn storage_type(&self) -> StorageType {
        match self {
            LeafValue::I64(_) => StorageType::I64,
            LeafValue::U64(_) => StorageType::U64,
            LeafValue::I32(_) => StorageType::I32,
            LeafValue::U32(_) => StorageType::U32,
            LeafValue::I16(_) => StorageType::I16,
            LeafValue::U16(_) => StorageType::U16,
            LeafValue::I8(_) => StorageType::I8,
            LeafValue::U8(_) => StorageType::U8,
            LeafValue::F64(_) => StorageType::F64,
        }
    }

    // Every integer variant fits losslessly in i128.
    fn wide(self) -> Option<i128> {
        match self {
            LeafValue::I64(v) => Some(v as i128),
            LeafValue::U64(v) => Some(v as i128),
            LeafValue::I32(v) => Some(v as i128),
            LeafValue::U32(v) => Some(v as i128),
            LeafValue::I16(v) => Some(v as i128),
            LeafValue::U16(v) => Some(v as i128),
            LeafValue::I8(v) => Some(v as i128),
            LeafValue::U8(v) => Some(v as i128),
            LeafValue::F64(_) => None,
        }
    }

    /// Convert to another storage type with truncating cast semantics.
    pub fn cast(self, to: StorageType) -> LeafValue {
        if self.storage_type() == to {
            return self;
        }
        match (self, self.wide()) {
            (LeafValue::F64(v), _) => match to {
                StorageType::I64 => LeafValue::I64(v as i64),
                StorageType::U64 => LeafValue::U64(v as u64),
                StorageType::I32 => LeafValue::I32(v as i32),
                StorageType::U32 => LeafValue::U32(v as u32),
                StorageType::I16 => LeafValue::I16(v as i16),
                StorageType::U16 => LeafValue::U16(v as u16),
                StorageType::I8 => LeafValue::I8(v as i8),
                StorageType::U8 => LeafValue::U8(v as u8),
                StorageType::F64 => LeafValue::F64(v),
            },
            (_, Some(w)) => match to {
                StorageType::I64 => LeafValue::I64(w as i64),
                StorageType::U64 => LeafValue::U64(w as u64),
                StorageType::I32 => LeafValue::I32(w as i32),
                StorageType::U32 => LeafValue::U32(w as u32),
                StorageType::I16 => LeafValue::I16(w as i16),
                StorageType::U16 => LeafValue::U16(w as u16),
                StorageType::I8 => LeafValue::I8(w as i8),
                StorageType::U8 => LeafValue::U8(w as u8),
                StorageType::F64 => LeafValue::F64(w as f64),
            },
            (other, None) => other,
        }
    }

    /// Value as `u64`, used for comparing join keys of different widths
    pub fn as_u64(self) -> u64 {
        match (self, self.wide()) {
            (LeafValue::F64(v), _) => v as u64,
            (_, Some(w)) => w as u64,
            (_, None) => 0,
        }
    }

    /// Value as `f64`
    pub fn as_f64(self) -> f64 {
        match (self, self.wide()) {
            (LeafValue::F64(v), _) => v,
            (_, Some(w)) => w as f64,
            (_, None) => 0.0,
        }
    }

    /// Decode a value of `storage` from native-endian bytes.
    ///
    /// `bytes` must hold exactly `storage.width()` bytes.
    pub fn read_ne(storage: StorageType, bytes: &[u8]) -> Option<LeafValue> {
        let value = match storage {
            StorageType::I64 => LeafValue::I64(i64::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::U64 => LeafValue::U64(u64::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::I32 => LeafValue::I32(i32::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::U32 => LeafValue::U32(u32::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::I16 => LeafValue::I16(i16::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::U16 => LeafValue::U16(u16::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::I8 => LeafValue::I8(i8::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::U8 => LeafValue::U8(u8::from_ne_bytes(bytes.try_into().ok()?)),
            StorageType::F64 => LeafValue::F64(f64::from_ne_bytes(bytes.try_into().ok()?)),
        };
        Some(value)
    }

    /// Encode this value as native-endian bytes into `out`.
    ///
    /// Returns `false` when `out` is not exactly the value's width.
    pub fn write_ne(self, out: &mut [u8]) -> bool {
        if out.len() != self.storage_type().width() {
            return false;
        }
        match self {
            LeafValue::I64(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::U64(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::I32(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::U32(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::I16(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::U16(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::I8(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::U8(v) => out.copy_from_slice(&v.to_ne_bytes()),
            LeafValue::F64(v) => out.copy_from_slice(&v.to_ne_bytes()),
        }
        true
    }
}
