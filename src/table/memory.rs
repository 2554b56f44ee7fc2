use arrow::record_batch::RecordBatch;

use super::{check_range, ColumnDesc, ColumnTable, RecordBatchIterator, TableError};

/// A table held in memory as a single Arrow record batch.
///
/// Slicing a `RecordBatch` is zero-copy, so range reads and batch iteration
/// only bump reference counts.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    batch: RecordBatch,
}

impl MemoryTable {
    /// Wrap a record batch as a table
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// The underlying batch
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

impl ColumnTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<ColumnDesc> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnDesc::from_field(f))
            .collect()
    }

    fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn read_range(&self, start: usize, stop: usize) -> Result<RecordBatch, TableError> {
        check_range(&self.name, start, stop, self.batch.num_rows())?;
        Ok(self.batch.slice(start, stop - start))
    }

    fn iter_batches(&self, batch_size: usize) -> Result<RecordBatchIterator, TableError> {
        let batch = self.batch.clone();
        let total = batch.num_rows();
        let step = batch_size.max(1);
        let iter = (0..total)
            .step_by(step)
            .map(move |start| Ok(batch.slice(start, step.min(total - start))));
        Ok(RecordBatchIterator::new(iter))
    }
}
