use super::{BranchDecl, LeafData, TreeError};
use crate::types::{ColumnBuffer, LeafValue};

/// What a sink reports once it is finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Row groups (or equivalent storage blocks) written
    pub row_groups: usize,
    /// Bytes of data written
    pub bytes_written: u64,
}

/// Destination of tree entries.
///
/// The tree calls `open` once with the final branch list before the first
/// entry (or at close time for a tree that was never filled), then
/// `write_entry` once per `fill()`, then `finish`.
pub trait EntrySink {
    /// Receive the tree header and branch layout
    fn open(&mut self, name: &str, title: &str, branches: &[BranchDecl]) -> Result<(), TreeError>;

    /// Write one entry; `values` holds one item per branch in declaration order
    fn write_entry(&mut self, values: Vec<LeafData>) -> Result<(), TreeError>;

    /// Flush everything and finalize the output
    fn finish(&mut self) -> Result<SinkReport, TreeError>;
}

/// A sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    title: String,
    branches: Vec<BranchDecl>,
    entries: Vec<Vec<LeafData>>,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree name received at open
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree title received at open
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Branch layout received at open
    pub fn branches(&self) -> &[BranchDecl] {
        &self.branches
    }

    /// All entries written so far
    pub fn entries(&self) -> &[Vec<LeafData>] {
        &self.entries
    }

    /// Whether `finish` was called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn branch_index(&self, name: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.name == name)
    }

    /// Values of a scalar branch across all entries
    pub fn scalars(&self, name: &str) -> Option<Vec<LeafValue>> {
        let index = self.branch_index(name)?;
        self.entries
            .iter()
            .map(|entry| match &entry[index] {
                LeafData::Scalar(value) => Some(*value),
                LeafData::Array(_) => None,
            })
            .collect()
    }

    /// Buffers of a repeated branch across all entries
    pub fn arrays(&self, name: &str) -> Option<Vec<ColumnBuffer>> {
        let index = self.branch_index(name)?;
        self.entries
            .iter()
            .map(|entry| match &entry[index] {
                LeafData::Array(buffer) => Some(buffer.clone()),
                LeafData::Scalar(_) => None,
            })
            .collect()
    }
}

impl EntrySink for MemorySink {
    fn open(&mut self, name: &str, title: &str, branches: &[BranchDecl]) -> Result<(), TreeError> {
        self.name = name.to_string();
        self.title = title.to_string();
        self.branches = branches.to_vec();
        Ok(())
    }

    fn write_entry(&mut self, values: Vec<LeafData>) -> Result<(), TreeError> {
        if self.finished {
            return Err(TreeError::Closed);
        }
        self.entries.push(values);
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkReport, TreeError> {
        if self.finished {
            return Err(TreeError::Closed);
        }
        self.finished = true;
        Ok(SinkReport::default())
    }
}
