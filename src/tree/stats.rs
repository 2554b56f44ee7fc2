use std::fmt;

/// Statistics from a closed tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of entries filled
    pub entries_written: u64,
    /// Number of values written, summed over all branches
    pub values_written: u64,
    /// Number of declared branches
    pub branches: usize,
    /// Number of Parquet row groups written (0 for in-memory sinks)
    pub row_groups_written: usize,
    /// Bytes of column data written (0 for in-memory sinks)
    pub bytes_written: u64,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} entries ({} values, {} branches) in {} row groups",
            self.entries_written, self.values_written, self.branches, self.row_groups_written
        )
    }
}
