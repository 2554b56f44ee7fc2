/// Errors that can occur while reading input tables
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Invalid input layout
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Requested table is not present
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column has an Arrow type the converter cannot read values from
    #[error("Unsupported column data type: {0}")]
    UnsupportedColumnType(String),

    /// Value read past the end of a column
    #[error("Row {row} out of bounds for column of length {len}")]
    RowOutOfBounds {
        /// Requested row
        row: usize,
        /// Column length
        len: usize,
    },

    /// Positional read outside the table
    #[error("Invalid range [{start}, {stop}) for table {table} with {num_rows} rows")]
    InvalidRange {
        /// Table name
        table: String,
        /// First row (inclusive)
        start: usize,
        /// Last row (exclusive)
        stop: usize,
        /// Rows in the table
        num_rows: usize,
    },
}
