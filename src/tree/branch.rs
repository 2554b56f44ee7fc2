use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::TreeError;
use crate::record::BoundRecord;
use crate::types::{ColumnBuffer, LeafType, LeafValue, StorageType};

/// Handle to a declared branch, valid for the tree that returned it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub(crate) usize);

impl BranchId {
    /// Declaration index of the branch
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Variable-length repetition of a branch, sized by a count branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    /// Name of the scalar branch holding the per-entry length
    pub count_branch: String,
    /// Maximum number of values per entry
    pub capacity: usize,
}

/// Declaration of one output branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDecl {
    /// Branch name
    pub name: String,
    /// Leaf type tag
    pub leaf: LeafType,
    /// Storage type of each value
    pub storage: StorageType,
    /// Repetition, `None` for one value per entry
    pub repeat: Option<Repeat>,
}

impl BranchDecl {
    /// A branch holding one value per entry
    pub fn scalar(name: impl Into<String>, leaf: LeafType, storage: StorageType) -> Self {
        Self {
            name: name.into(),
            leaf,
            storage,
            repeat: None,
        }
    }

    /// A branch holding `count_branch` values per entry, at most `capacity`
    pub fn repeated(
        name: impl Into<String>,
        leaf: LeafType,
        storage: StorageType,
        count_branch: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            leaf,
            storage,
            repeat: Some(Repeat {
                count_branch: count_branch.into(),
                capacity,
            }),
        }
    }

    /// A 32-bit count branch (`name/I`)
    pub fn counter(name: impl Into<String>) -> Self {
        Self::scalar(name, LeafType::Int, StorageType::I32)
    }

    /// Whether the branch holds several values per entry
    pub fn is_repeated(&self) -> bool {
        self.repeat.is_some()
    }

    /// Leaf list string, e.g. `tot/b` or `tot[n_entries]/b`
    pub fn leaflist(&self) -> String {
        match &self.repeat {
            Some(repeat) => format!("{}[{}]/{}", self.name, repeat.count_branch, self.leaf.code()),
            None => format!("{}/{}", self.name, self.leaf.code()),
        }
    }

    /// Footer description of the branch
    pub fn info(&self) -> BranchInfo {
        BranchInfo {
            name: self.name.clone(),
            leaflist: self.leaflist(),
        }
    }
}

/// Branch name and leaf list as stored in the tree file footer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Branch name
    pub name: String,
    /// Leaf list string
    pub leaflist: String,
}

/// The shared "active row count" of a chunked tree.
///
/// The bulk writer sets it before each fill; the tree reads it as the value
/// of the count branch and as the number of values to take from every
/// repeated buffer. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct ChunkSizeControl {
    capacity: usize,
    active: Rc<Cell<usize>>,
}

impl ChunkSizeControl {
    /// Create a control for chunks of at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            active: Rc::new(Cell::new(0)),
        }
    }

    /// Maximum rows per chunk
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows in the current chunk
    pub fn active(&self) -> usize {
        self.active.get()
    }

    /// Set the rows in the current chunk
    pub fn set_active(&self, active: usize) -> Result<(), TreeError> {
        if active > self.capacity {
            return Err(TreeError::ChunkOverflow {
                active,
                capacity: self.capacity,
            });
        }
        self.active.set(active);
        Ok(())
    }
}

/// The address a branch reads its value from at fill time.
pub enum Binding {
    /// Not bound yet, or the previous buffer was consumed
    Unbound,
    /// A member of a shared output record
    Member {
        /// Record handle
        record: BoundRecord,
        /// Member index in the record layout
        member: usize,
    },
    /// A column buffer owned by the tree until the next fill
    Buffer(ColumnBuffer),
    /// The active row count of a chunked tree
    Counter(ChunkSizeControl),
}

impl Binding {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Binding::Unbound => "nothing".to_string(),
            Binding::Member { record, member } => match record.member(*member) {
                Ok(m) => format!("{}.{} ({:?})", record.name(), m.name, m.storage),
                Err(_) => format!("{}[{}]", record.name(), member),
            },
            Binding::Buffer(buffer) => format!("{:?} buffer", buffer.storage_type()),
            Binding::Counter(_) => "chunk counter".to_string(),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        !matches!(self, Binding::Unbound)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// The value of one branch in one entry, as handed to the sink
#[derive(Debug, Clone, PartialEq)]
pub enum LeafData {
    /// One value
    Scalar(LeafValue),
    /// The values of a repeated branch
    Array(ColumnBuffer),
}

impl LeafData {
    /// Number of values carried
    pub fn len(&self) -> usize {
        match self {
            LeafData::Scalar(_) => 1,
            LeafData::Array(buffer) => buffer.len(),
        }
    }

    /// Whether no values are carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
