use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::{ParquetTable, TableError};

/// A directory holding one `<table>.parquet` file per table.
///
/// ```text
/// run_52_interpreted/
/// ├── Hits.parquet        # hit table
/// └── meta_data.parquet   # meta (timing) table
/// ```
#[derive(Debug, Clone)]
pub struct TableBundle {
    root: PathBuf,
}

impl TableBundle {
    /// Open an existing bundle directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(TableError::InvalidFormat(format!(
                "Table bundle is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Create (or reuse) a bundle directory for writing tables
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Bundle directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.parquet", name))
    }

    /// Whether the bundle holds a table with this name
    pub fn has_table(&self, name: &str) -> bool {
        self.table_path(name).is_file()
    }

    /// Names of all tables in the bundle, sorted
    pub fn table_names(&self) -> Result<Vec<String>, TableError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "parquet").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Open a table by name
    pub fn table(&self, name: &str) -> Result<ParquetTable, TableError> {
        let path = self.table_path(name);
        if !path.is_file() {
            return Err(TableError::TableNotFound(format!(
                "{} (expected {})",
                name,
                path.display()
            )));
        }
        debug!("Opening table {} from {}", name, path.display());
        ParquetTable::open(name, path)
    }

    /// Write a record batch as a table, replacing any existing table of that name
    pub fn write_table(&self, name: &str, batch: &RecordBatch) -> Result<(), TableError> {
        let path = self.table_path(name);
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(File::create(&path)?, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        debug!("Wrote table {} ({} rows) to {}", name, batch.num_rows(), path.display());
        Ok(())
    }
}
