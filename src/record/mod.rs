//! # Output Records
//!
//! In row mode the tree reads each entry from a fixed, field-addressable
//! record: the engine writes a hit's values into the record's members, then
//! the tree copies those members out on `fill()`. Every member sits at a
//! compile-time offset inside a `#[repr(C, packed)]` struct, so a branch
//! bound to a record member is simply `(record, offset, storage)`.
//!
//! Records are plain old data (`bytemuck::Pod`), which lets members be read
//! and written through the record's byte view without any `unsafe`.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use hittree::record::{BoundRecord, HitInfo};
//! use hittree::types::LeafValue;
//!
//! let hit = Rc::new(RefCell::new(HitInfo::default()));
//! let bound = BoundRecord::new(&hit);
//!
//! let tot = bound.index_of("tot").unwrap();
//! bound.set(tot, LeafValue::U32(300)).unwrap();
//! assert_eq!({ hit.borrow().tot }, 44);
//! ```

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::fmt;
use std::mem::offset_of;
use std::ops::Range;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::types::{LeafValue, StorageType};

/// Errors raised when accessing record members
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The record has no member with this name
    #[error("Record {record} has no member {member}")]
    UnknownMember {
        /// Record type name
        record: &'static str,
        /// Requested member
        member: String,
    },

    /// Member index past the end of the layout
    #[error("Record {record} has no member at index {index}")]
    BadIndex {
        /// Record type name
        record: &'static str,
        /// Requested index
        index: usize,
    },

    /// The record is already borrowed elsewhere
    #[error("Record {0} is borrowed elsewhere")]
    Busy(&'static str),
}

/// One named member of an output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Field name the member binds to
    pub name: &'static str,
    /// Byte offset inside the record
    pub offset: usize,
    /// Storage type of the member
    pub storage: StorageType,
}

impl Member {
    /// Describe a member
    pub const fn new(name: &'static str, offset: usize, storage: StorageType) -> Self {
        Self {
            name,
            offset,
            storage,
        }
    }

    /// Byte range of the member inside the record
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.storage.width()
    }
}

/// A statically laid-out record that can back tree branches.
pub trait OutputRecord: Pod {
    /// Record type name, used in error messages
    const NAME: &'static str;

    /// Members in declaration order
    const MEMBERS: &'static [Member];

    /// Look up a member by field name
    fn member(name: &str) -> Option<&'static Member> {
        Self::MEMBERS.iter().find(|m| m.name == name)
    }
}

/// Byte view of a record, the object-safe part of [`OutputRecord`].
pub trait RecordStorage {
    /// Record bytes
    fn bytes(&self) -> &[u8];

    /// Mutable record bytes
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl<T: Pod> RecordStorage for T {
    fn bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }
}

/// A shared record handle with its layout, with the concrete type erased.
///
/// Cloning is cheap and every clone refers to the same record. The engine
/// writes through one clone while the tree reads through another.
#[derive(Clone)]
pub struct BoundRecord {
    name: &'static str,
    members: &'static [Member],
    storage: Rc<RefCell<dyn RecordStorage>>,
}

impl BoundRecord {
    /// Share a concrete record
    pub fn new<T: OutputRecord + 'static>(record: &Rc<RefCell<T>>) -> Self {
        let storage: Rc<RefCell<dyn RecordStorage>> = record.clone();
        Self {
            name: T::NAME,
            members: T::MEMBERS,
            storage,
        }
    }

    /// Record type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record layout
    pub fn members(&self) -> &'static [Member] {
        self.members
    }

    /// Index of the member with this field name
    pub fn index_of(&self, name: &str) -> Result<usize, RecordError> {
        self.members
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| RecordError::UnknownMember {
                record: self.name,
                member: name.to_string(),
            })
    }

    /// Member at `index`
    pub fn member(&self, index: usize) -> Result<&'static Member, RecordError> {
        self.members.get(index).ok_or(RecordError::BadIndex {
            record: self.name,
            index,
        })
    }

    /// Read a member in its own storage type
    pub fn get(&self, index: usize) -> Result<LeafValue, RecordError> {
        let member = self.member(index)?;
        let storage = self
            .storage
            .try_borrow()
            .map_err(|_| RecordError::Busy(self.name))?;
        LeafValue::read_ne(member.storage, &storage.bytes()[member.range()]).ok_or(
            RecordError::BadIndex {
                record: self.name,
                index,
            },
        )
    }

    /// Write a member, casting `value` to the member's storage type
    pub fn set(&self, index: usize, value: LeafValue) -> Result<(), RecordError> {
        let member = self.member(index)?;
        let mut storage = self
            .storage
            .try_borrow_mut()
            .map_err(|_| RecordError::Busy(self.name))?;
        let written = value
            .cast(member.storage)
            .write_ne(&mut storage.bytes_mut()[member.range()]);
        if written {
            Ok(())
        } else {
            Err(RecordError::BadIndex {
                record: self.name,
                index,
            })
        }
    }

    /// Whether two handles point at the same record
    pub fn same_record(&self, other: &BoundRecord) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }
}

impl fmt::Debug for BoundRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundRecord")
            .field("name", &self.name)
            .field("members", &self.members.len())
            .finish()
    }
}

/// Row-mode record for one hit.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct HitInfo {
    /// Event the hit belongs to
    pub event_number: u64,
    /// Trigger counter
    pub trigger_number: u32,
    /// Bunch crossing relative to the trigger
    pub relative_bcid: u8,
    /// Level-1 trigger id
    pub lvl1id: u16,
    /// Pixel column
    pub column: u8,
    /// Pixel row
    pub row: u16,
    /// Time over threshold
    pub tot: u8,
    /// Absolute bunch crossing id
    pub bcid: u16,
    /// TDC value
    pub tdc: u16,
    /// TDC time stamp
    pub tdc_time_stamp: u16,
    /// Trigger status flags
    pub trigger_status: u8,
    /// Service record word
    pub service_record: u32,
    /// Event status flags
    pub event_status: u16,
}

impl OutputRecord for HitInfo {
    const NAME: &'static str = "HitInfo";
    const MEMBERS: &'static [Member] = &[
        Member::new("event_number", offset_of!(HitInfo, event_number), StorageType::U64),
        Member::new("trigger_number", offset_of!(HitInfo, trigger_number), StorageType::U32),
        Member::new("relative_BCID", offset_of!(HitInfo, relative_bcid), StorageType::U8),
        Member::new("LVL1ID", offset_of!(HitInfo, lvl1id), StorageType::U16),
        Member::new("column", offset_of!(HitInfo, column), StorageType::U8),
        Member::new("row", offset_of!(HitInfo, row), StorageType::U16),
        Member::new("tot", offset_of!(HitInfo, tot), StorageType::U8),
        Member::new("BCID", offset_of!(HitInfo, bcid), StorageType::U16),
        Member::new("TDC", offset_of!(HitInfo, tdc), StorageType::U16),
        Member::new("TDC_time_stamp", offset_of!(HitInfo, tdc_time_stamp), StorageType::U16),
        Member::new("trigger_status", offset_of!(HitInfo, trigger_status), StorageType::U8),
        Member::new("service_record", offset_of!(HitInfo, service_record), StorageType::U32),
        Member::new("event_status", offset_of!(HitInfo, event_status), StorageType::U16),
    ];
}

/// Row-mode record for the meta fields of the current event.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct MetaInfo {
    /// Event the timing belongs to
    pub event_number: u32,
    /// Readout start time
    pub timestamp_start: f64,
    /// Readout stop time
    pub timestamp_stop: f64,
    /// Readout error code
    pub error_code: u8,
}

impl OutputRecord for MetaInfo {
    const NAME: &'static str = "MetaInfo";
    const MEMBERS: &'static [Member] = &[
        Member::new("event_number", offset_of!(MetaInfo, event_number), StorageType::U32),
        Member::new("timestamp_start", offset_of!(MetaInfo, timestamp_start), StorageType::F64),
        Member::new("timestamp_stop", offset_of!(MetaInfo, timestamp_stop), StorageType::F64),
        Member::new("error_code", offset_of!(MetaInfo, error_code), StorageType::U8),
    ];
}
