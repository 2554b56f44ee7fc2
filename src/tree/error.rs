use crate::record::RecordError;

/// Errors that can occur while declaring, binding or filling a tree
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the Arrow library while assembling a batch
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Error from the Parquet library while writing or reading the file
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Error encoding or decoding footer metadata
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A branch with this name already exists
    #[error("Branch {0} is already declared")]
    DuplicateBranch(String),

    /// A repeated branch references a count branch that does not exist
    #[error("Branch {branch} is sized by undeclared count branch {count_branch}")]
    UnknownCountBranch {
        /// Repeated branch
        branch: String,
        /// Missing count branch
        count_branch: String,
    },

    /// No branch with this id
    #[error("No branch with id {0}")]
    NoSuchBranch(usize),

    /// Branches cannot be declared once entries were filled
    #[error("Cannot declare branch {0} after the first fill")]
    Frozen(String),

    /// A branch has no address at fill time
    #[error("Branch {0} has no bound address")]
    Unbound(String),

    /// A binding does not fit the branch declaration
    #[error("Branch {branch} expects {expected}, got {found}")]
    TypeMismatch {
        /// Branch name
        branch: String,
        /// What the declaration requires
        expected: String,
        /// What was bound
        found: String,
    },

    /// A bound buffer holds fewer values than the entry needs
    #[error("Buffer for branch {branch} holds {available} values, entry needs {needed}")]
    ShortBuffer {
        /// Branch name
        branch: String,
        /// Values required by the entry
        needed: usize,
        /// Values present in the buffer
        available: usize,
    },

    /// An active row count exceeds the chunk capacity
    #[error("Active row count {active} exceeds chunk capacity {capacity}")]
    ChunkOverflow {
        /// Requested active row count
        active: usize,
        /// Chunk capacity
        capacity: usize,
    },

    /// A repeated column holds more values than one list batch can address
    #[error("Branch {branch} holds {values} values, above the list offset range")]
    ListOverflow {
        /// Branch name
        branch: String,
        /// Values buffered for the branch
        values: usize,
    },

    /// A bound record is mutably borrowed while the tree reads it
    #[error("Record bound to branch {0} is borrowed elsewhere")]
    RecordBusy(String),

    /// Error accessing a bound record
    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    /// The sink was already finished
    #[error("Tree output is already closed")]
    Closed,
}
