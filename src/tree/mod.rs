//! # Output Tree
//!
//! An append-only, row-oriented output container. A tree has a name, a
//! title and an ordered list of branches; each `fill()` appends one entry
//! holding one value (or, for repeated branches, a run of values) per branch.
//!
//! Writing happens in three phases:
//!
//! 1. **Declare** branches with [`Tree::branch`]. Declaration is append-only:
//!    duplicate names and repeats sized by an undeclared count branch are
//!    refused, and no branch can be added once the first entry was filled.
//! 2. **Bind** every branch to an address with [`Tree::set_address`]: a
//!    member of a shared output record, a column buffer, or a chunk counter.
//! 3. **Fill** entries with [`Tree::fill`], then [`Tree::close`] the tree.
//!
//! Entries go to an [`EntrySink`]. [`ParquetSink`] writes them to a Parquet
//! file (created through [`TreeFile::create`]); [`MemorySink`] keeps them in
//! memory.
//!
//! ## Example
//!
//! ```rust
//! use hittree::tree::{Binding, BranchDecl, ChunkSizeControl, MemorySink, Tree};
//! use hittree::types::{ColumnBuffer, LeafType, LeafValue, StorageType};
//!
//! let mut tree = Tree::new("Table", "Converted HDF5 table", MemorySink::new());
//! let count = tree.branch(BranchDecl::counter("n_entries"))?;
//! let tot = tree.branch(BranchDecl::repeated(
//!     "tot", LeafType::UChar, StorageType::U8, "n_entries", 4,
//! ))?;
//!
//! let control = ChunkSizeControl::new(4);
//! tree.set_address(count, Binding::Counter(control.clone()))?;
//!
//! let mut buffer = ColumnBuffer::with_capacity(StorageType::U8, 4);
//! buffer.push(LeafValue::U8(7));
//! buffer.push(LeafValue::U8(9));
//! tree.set_address(tot, Binding::Buffer(buffer))?;
//! control.set_active(2)?;
//! tree.fill()?;
//!
//! let (sink, stats) = tree.close()?;
//! assert_eq!(stats.entries_written, 1);
//! assert_eq!(sink.arrays("tot").unwrap()[0].len(), 2);
//! # Ok::<(), hittree::tree::TreeError>(())
//! ```

mod branch;
mod config;
mod error;
mod parquet_sink;
mod sink;
mod stats;

#[cfg(test)]
mod tests;

use log::debug;

use crate::record::RecordError;
use crate::types::LeafValue;

pub use branch::{BranchDecl, BranchId, BranchInfo, Binding, ChunkSizeControl, LeafData, Repeat};
pub use config::{CompressionType, TreeWriterConfig, DEFAULT_TREE_NAME, DEFAULT_TREE_TITLE};
pub use error::TreeError;
pub use parquet_sink::{
    read_tree_info, ParquetSink, TreeFile, TreeInfo, FORMAT_VERSION, KEY_BRANCHES, KEY_CREATED,
    KEY_FORMAT_VERSION, KEY_LEAFLIST, KEY_TREE_NAME, KEY_TREE_TITLE,
};
pub use sink::{EntrySink, MemorySink, SinkReport};
pub use stats::TreeStats;

/// A row-oriented output tree writing entries to a sink.
///
/// Trees hold shared (`Rc`) handles to records and counters, so a tree and
/// everything bound to it live on one thread.
pub struct Tree<S: EntrySink> {
    name: String,
    title: String,
    branches: Vec<BranchDecl>,
    /// Index of the count branch for each repeated branch
    counts: Vec<Option<usize>>,
    bindings: Vec<Binding>,
    sink: S,
    opened: bool,
    entries: u64,
    values: u64,
}

impl<S: EntrySink> Tree<S> {
    /// Create an empty tree
    pub fn new(name: impl Into<String>, title: impl Into<String>, sink: S) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            branches: Vec::new(),
            counts: Vec::new(),
            bindings: Vec::new(),
            sink,
            opened: false,
            entries: 0,
            values: 0,
        }
    }

    /// Tree name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Declared branches, in declaration order
    pub fn branches(&self) -> &[BranchDecl] {
        &self.branches
    }

    /// Id of the branch with this name
    pub fn branch_id(&self, name: &str) -> Option<BranchId> {
        self.branches.iter().position(|b| b.name == name).map(BranchId)
    }

    /// Entries filled so far
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// The sink entries are written to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Declare a new branch.
    pub fn branch(&mut self, decl: BranchDecl) -> Result<BranchId, TreeError> {
        if self.opened {
            return Err(TreeError::Frozen(decl.name));
        }
        if self.branch_id(&decl.name).is_some() {
            return Err(TreeError::DuplicateBranch(decl.name));
        }

        let count = match &decl.repeat {
            Some(repeat) => {
                let index = self
                    .branches
                    .iter()
                    .position(|b| b.name == repeat.count_branch && !b.is_repeated())
                    .ok_or_else(|| TreeError::UnknownCountBranch {
                        branch: decl.name.clone(),
                        count_branch: repeat.count_branch.clone(),
                    })?;
                Some(index)
            }
            None => None,
        };

        debug!("Declaring branch {}", decl.leaflist());
        let id = BranchId(self.branches.len());
        self.branches.push(decl);
        self.counts.push(count);
        self.bindings.push(Binding::Unbound);
        Ok(id)
    }

    /// Bind a branch to the address its values are read from at fill time.
    ///
    /// Rebinding replaces the previous binding. Buffers bound to a branch are
    /// owned by the tree until the next `fill()`, which consumes them. Record
    /// members are read at fill time and cast to the branch storage.
    pub fn set_address(&mut self, id: BranchId, binding: Binding) -> Result<(), TreeError> {
        let decl = self
            .branches
            .get(id.0)
            .ok_or(TreeError::NoSuchBranch(id.0))?;

        let compatible = match &binding {
            Binding::Unbound => true,
            Binding::Member { record, member } => {
                record.member(*member)?;
                !decl.is_repeated()
            }
            Binding::Buffer(buffer) => buffer.storage_type() == decl.storage,
            Binding::Counter(_) => !decl.is_repeated(),
        };
        if !compatible {
            let expected = match &decl.repeat {
                Some(repeat) => format!("{:?}[{}]", decl.storage, repeat.count_branch),
                None => format!("{:?}", decl.storage),
            };
            return Err(TreeError::TypeMismatch {
                branch: decl.name.clone(),
                expected,
                found: binding.describe(),
            });
        }

        self.bindings[id.0] = binding;
        Ok(())
    }

    /// Value of a scalar branch for the current entry, without consuming it
    fn scalar(&self, index: usize) -> Result<LeafValue, TreeError> {
        let decl = &self.branches[index];
        match &self.bindings[index] {
            Binding::Unbound => Err(TreeError::Unbound(decl.name.clone())),
            Binding::Member { record, member } => record
                .get(*member)
                .map(|value| value.cast(decl.storage))
                .map_err(|e| match e {
                    RecordError::Busy(_) => TreeError::RecordBusy(decl.name.clone()),
                    other => TreeError::RecordError(other),
                }),
            Binding::Buffer(buffer) => buffer.get(0).ok_or_else(|| TreeError::ShortBuffer {
                branch: decl.name.clone(),
                needed: 1,
                available: 0,
            }),
            Binding::Counter(control) => {
                Ok(LeafValue::U64(control.active() as u64).cast(decl.storage))
            }
        }
    }

    /// Number of values a repeated branch takes in the current entry
    fn repeat_len(&self, index: usize, count_index: usize) -> Result<usize, TreeError> {
        let decl = &self.branches[index];
        let len = match &self.bindings[count_index] {
            Binding::Counter(control) => control.active(),
            _ => self.scalar(count_index)?.as_u64() as usize,
        };
        let capacity = decl.repeat.as_ref().map(|r| r.capacity).unwrap_or(0);
        if len > capacity {
            return Err(TreeError::ChunkOverflow {
                active: len,
                capacity,
            });
        }
        Ok(len)
    }

    fn open_sink(&mut self) -> Result<(), TreeError> {
        if !self.opened {
            self.sink.open(&self.name, &self.title, &self.branches)?;
            self.opened = true;
        }
        Ok(())
    }

    /// Append one entry built from the current bindings.
    ///
    /// Every branch must be bound, and every repeated branch's buffer must
    /// hold at least as many values as its count branch says. Nothing is
    /// written (and no buffer is consumed) when a check fails.
    pub fn fill(&mut self) -> Result<(), TreeError> {
        let mut lengths = Vec::with_capacity(self.branches.len());
        for (index, decl) in self.branches.iter().enumerate() {
            let binding = &self.bindings[index];
            if !binding.is_bound() {
                return Err(TreeError::Unbound(decl.name.clone()));
            }
            match self.counts[index] {
                Some(count_index) => {
                    let needed = self.repeat_len(index, count_index)?;
                    match binding {
                        Binding::Buffer(buffer) if buffer.len() >= needed => {}
                        Binding::Buffer(buffer) => {
                            return Err(TreeError::ShortBuffer {
                                branch: decl.name.clone(),
                                needed,
                                available: buffer.len(),
                            })
                        }
                        other => {
                            return Err(TreeError::TypeMismatch {
                                branch: decl.name.clone(),
                                expected: "column buffer".to_string(),
                                found: other.describe(),
                            })
                        }
                    }
                    lengths.push(Some(needed));
                }
                None => {
                    self.scalar(index)?;
                    lengths.push(None);
                }
            }
        }

        self.open_sink()?;

        let mut values = Vec::with_capacity(self.branches.len());
        let mut value_count = 0u64;
        for (index, len) in lengths.into_iter().enumerate() {
            let data = match len {
                Some(len) => {
                    let binding = std::mem::replace(&mut self.bindings[index], Binding::Unbound);
                    match binding {
                        Binding::Buffer(mut buffer) => {
                            buffer.truncate(len);
                            LeafData::Array(buffer)
                        }
                        _ => return Err(TreeError::Unbound(self.branches[index].name.clone())),
                    }
                }
                None => {
                    let value = self.scalar(index)?;
                    if matches!(self.bindings[index], Binding::Buffer(_)) {
                        self.bindings[index] = Binding::Unbound;
                    }
                    LeafData::Scalar(value)
                }
            };
            value_count += data.len() as u64;
            values.push(data);
        }

        self.sink.write_entry(values)?;
        self.entries += 1;
        self.values += value_count;
        Ok(())
    }

    /// Finalize the sink and hand it back with the write statistics.
    pub fn close(mut self) -> Result<(S, TreeStats), TreeError> {
        self.open_sink()?;
        let report = self.sink.finish()?;
        let stats = TreeStats {
            entries_written: self.entries,
            values_written: self.values,
            branches: self.branches.len(),
            row_groups_written: report.row_groups,
            bytes_written: report.bytes_written,
        };
        debug!("Closed tree {}: {}", self.name, stats);
        Ok((self.sink, stats))
    }
}
