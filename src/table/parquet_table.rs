use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::ChunkReader;

use super::{check_range, ColumnDesc, ColumnTable, RecordBatchIterator, TableError};

/// Where the Parquet data of a table lives (kept for re-reading)
enum TableSource {
    /// File path, reopened for every scan
    FilePath(PathBuf),
    /// In-memory Parquet file
    Bytes(Bytes),
}

/// A table stored as one Parquet file.
pub struct ParquetTable {
    name: String,
    source: TableSource,
    schema: SchemaRef,
    num_rows: usize,
}

impl ParquetTable {
    /// Open a Parquet file as a table
    pub fn open<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?;
        let schema = builder.schema().clone();
        let num_rows = builder.metadata().file_metadata().num_rows() as usize;

        Ok(Self {
            name: name.into(),
            source: TableSource::FilePath(path),
            schema,
            num_rows,
        })
    }

    /// Use an in-memory Parquet file as a table
    pub fn from_bytes(name: impl Into<String>, bytes: Bytes) -> Result<Self, TableError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())?;
        let schema = builder.schema().clone();
        let num_rows = builder.metadata().file_metadata().num_rows() as usize;

        Ok(Self {
            name: name.into(),
            source: TableSource::Bytes(bytes),
            schema,
            num_rows,
        })
    }

    /// Arrow schema of the table
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn scan(
        &self,
        offset: usize,
        limit: Option<usize>,
        batch_size: usize,
    ) -> Result<RecordBatchIterator, TableError> {
        match &self.source {
            TableSource::FilePath(path) => {
                build_scan(File::open(path)?, offset, limit, batch_size)
            }
            TableSource::Bytes(bytes) => build_scan(bytes.clone(), offset, limit, batch_size),
        }
    }
}

fn build_scan<T: ChunkReader + 'static>(
    input: T,
    offset: usize,
    limit: Option<usize>,
    batch_size: usize,
) -> Result<RecordBatchIterator, TableError> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(input)?
        .with_batch_size(batch_size.max(1))
        .with_offset(offset);
    if let Some(limit) = limit {
        builder = builder.with_limit(limit);
    }
    Ok(RecordBatchIterator::new(builder.build()?))
}

impl ColumnTable for ParquetTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<ColumnDesc> {
        self.schema
            .fields()
            .iter()
            .map(|f| ColumnDesc::from_field(f))
            .collect()
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn read_range(&self, start: usize, stop: usize) -> Result<RecordBatch, TableError> {
        check_range(&self.name, start, stop, self.num_rows)?;
        if start == stop {
            return Ok(RecordBatch::new_empty(self.schema.clone()));
        }

        let batches = self
            .scan(start, Some(stop - start), stop - start)?
            .collect::<Result<Vec<_>, _>>()?;
        match batches.as_slice() {
            [] => Ok(RecordBatch::new_empty(self.schema.clone())),
            [single] => Ok(single.clone()),
            many => Ok(concat_batches(&many[0].schema(), many)?),
        }
    }

    fn iter_batches(&self, batch_size: usize) -> Result<RecordBatchIterator, TableError> {
        self.scan(0, None, batch_size)
    }
}
