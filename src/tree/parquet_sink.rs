use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, ListArray};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::reader::{FileReader, SerializedFileReader};

use super::{
    BranchDecl, BranchInfo, EntrySink, LeafData, SinkReport, Tree, TreeError, TreeWriterConfig,
};
use crate::types::ColumnBuffer;

/// Footer key holding the tree name
pub const KEY_TREE_NAME: &str = "hittree:tree_name";
/// Footer key holding the tree title
pub const KEY_TREE_TITLE: &str = "hittree:tree_title";
/// Footer key holding the JSON branch list
pub const KEY_BRANCHES: &str = "hittree:branches";
/// Footer key holding the file format version
pub const KEY_FORMAT_VERSION: &str = "hittree:format_version";
/// Footer key holding the creation time (RFC 3339)
pub const KEY_CREATED: &str = "hittree:created";
/// Current tree file format version
pub const FORMAT_VERSION: &str = "1.0";
/// Arrow field metadata key carrying a branch's leaf list
pub const KEY_LEAFLIST: &str = "leaflist";

/// Values of one branch waiting to be written
struct PendingColumn {
    values: ColumnBuffer,
    /// List offsets for repeated branches, `None` for scalar branches
    offsets: Option<Vec<i32>>,
    item_field: Option<FieldRef>,
}

impl PendingColumn {
    fn new(decl: &BranchDecl, item_field: Option<FieldRef>) -> Self {
        Self {
            values: ColumnBuffer::with_capacity(decl.storage, 0),
            offsets: decl.repeat.as_ref().map(|_| vec![0]),
            item_field,
        }
    }

    fn take_array(&mut self) -> Result<ArrayRef, TreeError> {
        let storage = self.values.storage_type();
        let values = std::mem::replace(&mut self.values, ColumnBuffer::with_capacity(storage, 0));
        let values = values.into_array();

        match (&mut self.offsets, &self.item_field) {
            (Some(offsets), Some(item_field)) => {
                let offsets = std::mem::replace(offsets, vec![0]);
                let list = ListArray::try_new(
                    item_field.clone(),
                    OffsetBuffer::new(ScalarBuffer::from(offsets)),
                    values,
                    None,
                )?;
                Ok(Arc::new(list))
            }
            _ => Ok(values),
        }
    }
}

/// An [`EntrySink`] writing entries to a Parquet file.
///
/// Scalar branches become primitive columns and repeated branches become
/// `List<primitive>` columns, one Parquet row per entry. Entries are buffered
/// column-wise and handed to the Arrow writer as one record batch whenever
/// `batch_entries` entries or `batch_values` values are pending.
pub struct ParquetSink<W: Write + Send> {
    config: TreeWriterConfig,
    output: Option<W>,
    writer: Option<ArrowWriter<W>>,
    schema: Option<SchemaRef>,
    columns: Vec<PendingColumn>,
    pending_entries: usize,
    pending_values: usize,
    finished: bool,
}

impl<W: Write + Send> ParquetSink<W> {
    /// Create a sink writing to `output` once the tree layout is known
    pub fn new(output: W, config: TreeWriterConfig) -> Self {
        Self {
            config,
            output: Some(output),
            writer: None,
            schema: None,
            columns: Vec::new(),
            pending_entries: 0,
            pending_values: 0,
            finished: false,
        }
    }

    /// Writer configuration
    pub fn config(&self) -> &TreeWriterConfig {
        &self.config
    }

    fn flush(&mut self) -> Result<(), TreeError> {
        if self.pending_entries == 0 {
            return Ok(());
        }
        let (writer, schema) = match (&mut self.writer, &self.schema) {
            (Some(writer), Some(schema)) => (writer, schema.clone()),
            _ => return Err(TreeError::Closed),
        };

        let arrays = self
            .columns
            .iter_mut()
            .map(PendingColumn::take_array)
            .collect::<Result<Vec<_>, _>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.pending_entries));
        let batch = RecordBatch::try_new_with_options(schema, arrays, &options)?;

        debug!(
            "Writing batch of {} entries ({} values)",
            self.pending_entries, self.pending_values
        );
        writer.write(&batch)?;
        self.pending_entries = 0;
        self.pending_values = 0;
        Ok(())
    }
}

fn branch_field(decl: &BranchDecl) -> (Field, Option<FieldRef>) {
    let metadata = HashMap::from([(KEY_LEAFLIST.to_string(), decl.leaflist())]);
    match decl.repeat {
        Some(_) => {
            let item: FieldRef = Arc::new(Field::new("item", decl.storage.arrow_type(), false));
            let field = Field::new_list(decl.name.clone(), item.clone(), false);
            (field.with_metadata(metadata), Some(item))
        }
        None => {
            let field = Field::new(decl.name.clone(), decl.storage.arrow_type(), false);
            (field.with_metadata(metadata), None)
        }
    }
}

fn footer_metadata(
    name: &str,
    title: &str,
    branches: &[BranchDecl],
) -> Result<BTreeMap<String, String>, TreeError> {
    let infos: Vec<BranchInfo> = branches.iter().map(BranchDecl::info).collect();
    let mut metadata = BTreeMap::new();
    metadata.insert(KEY_TREE_NAME.to_string(), name.to_string());
    metadata.insert(KEY_TREE_TITLE.to_string(), title.to_string());
    metadata.insert(KEY_BRANCHES.to_string(), serde_json::to_string(&infos)?);
    metadata.insert(KEY_FORMAT_VERSION.to_string(), FORMAT_VERSION.to_string());
    metadata.insert(KEY_CREATED.to_string(), chrono::Utc::now().to_rfc3339());
    Ok(metadata)
}

impl<W: Write + Send> EntrySink for ParquetSink<W> {
    fn open(&mut self, name: &str, title: &str, branches: &[BranchDecl]) -> Result<(), TreeError> {
        let output = self.output.take().ok_or(TreeError::Closed)?;

        let mut fields = Vec::with_capacity(branches.len());
        self.columns.clear();
        for decl in branches {
            let (field, item) = branch_field(decl);
            fields.push(field);
            self.columns.push(PendingColumn::new(decl, item));
        }
        let schema = Arc::new(Schema::new(fields));

        let props = self
            .config
            .to_writer_properties(&footer_metadata(name, title, branches)?);
        self.writer = Some(ArrowWriter::try_new(output, schema.clone(), Some(props))?);
        self.schema = Some(schema);
        debug!("Opened tree {} with {} branches", name, branches.len());
        Ok(())
    }

    fn write_entry(&mut self, values: Vec<LeafData>) -> Result<(), TreeError> {
        if self.finished || self.writer.is_none() {
            return Err(TreeError::Closed);
        }
        if values.len() != self.columns.len() {
            return Err(TreeError::TypeMismatch {
                branch: "<entry>".to_string(),
                expected: format!("{} values", self.columns.len()),
                found: format!("{} values", values.len()),
            });
        }

        for (index, (column, data)) in self.columns.iter_mut().zip(values).enumerate() {
            let appended = match (&mut column.offsets, data) {
                (None, LeafData::Scalar(value)) => {
                    column.values.push(value);
                    self.pending_values += 1;
                    true
                }
                (Some(offsets), LeafData::Array(buffer)) => {
                    let ok = column.values.append(&buffer);
                    let len = column.values.len();
                    let end = i32::try_from(len).map_err(|_| TreeError::ListOverflow {
                        branch: self
                            .schema
                            .as_ref()
                            .map(|s| s.field(index).name().clone())
                            .unwrap_or_default(),
                        values: len,
                    })?;
                    offsets.push(end);
                    self.pending_values += buffer.len();
                    ok
                }
                _ => false,
            };
            if !appended {
                let field = self
                    .schema
                    .as_ref()
                    .map(|s| s.field(index).name().clone())
                    .unwrap_or_default();
                return Err(TreeError::TypeMismatch {
                    branch: field,
                    expected: format!("{:?}", column.values.storage_type()),
                    found: "incompatible leaf data".to_string(),
                });
            }
        }
        self.pending_entries += 1;

        if self.pending_entries >= self.config.batch_entries
            || self.pending_values >= self.config.batch_values
        {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkReport, TreeError> {
        if self.finished {
            return Err(TreeError::Closed);
        }
        self.flush()?;
        self.finished = true;

        let writer = self.writer.take().ok_or(TreeError::Closed)?;
        let file_metadata = writer.close()?;

        Ok(SinkReport {
            row_groups: file_metadata.row_groups.len(),
            bytes_written: file_metadata
                .row_groups
                .iter()
                .map(|rg| rg.total_byte_size as u64)
                .sum(),
        })
    }
}

/// Entry point for tree files on disk.
pub struct TreeFile;

impl TreeFile {
    /// Create (or overwrite) a Parquet tree file.
    ///
    /// The returned tree takes its name and title from `config`.
    pub fn create<P: AsRef<Path>>(
        path: P,
        config: TreeWriterConfig,
    ) -> Result<Tree<ParquetSink<File>>, TreeError> {
        let file = File::create(path.as_ref())?;
        debug!("Creating tree file {}", path.as_ref().display());
        let name = config.tree_name.clone();
        let title = config.tree_title.clone();
        Ok(Tree::new(name, title, ParquetSink::new(file, config)))
    }
}

/// Header information of a tree file
#[derive(Debug, Clone)]
pub struct TreeInfo {
    /// Tree name
    pub name: String,
    /// Tree title
    pub title: String,
    /// File format version
    pub format_version: String,
    /// Creation time, if recorded
    pub created: Option<String>,
    /// Branches in declaration order
    pub branches: Vec<BranchInfo>,
    /// Number of entries
    pub entries: i64,
    /// Number of row groups
    pub row_groups: usize,
    /// File size in bytes
    pub file_size_bytes: u64,
}

/// Read the footer of a tree file written by [`ParquetSink`]
pub fn read_tree_info<P: AsRef<Path>>(path: P) -> Result<TreeInfo, TreeError> {
    let file = File::open(path.as_ref())?;
    let file_size_bytes = file.metadata()?.len();
    let reader = SerializedFileReader::new(file)?;
    let parquet_metadata = reader.metadata();
    let file_meta = parquet_metadata.file_metadata();

    let mut kv = HashMap::new();
    if let Some(kv_list) = file_meta.key_value_metadata() {
        for entry in kv_list {
            if let Some(value) = &entry.value {
                kv.insert(entry.key.clone(), value.clone());
            }
        }
    }

    let branches = match kv.get(KEY_BRANCHES) {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };

    Ok(TreeInfo {
        name: kv.get(KEY_TREE_NAME).cloned().unwrap_or_default(),
        title: kv.get(KEY_TREE_TITLE).cloned().unwrap_or_default(),
        format_version: kv
            .get(KEY_FORMAT_VERSION)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        created: kv.get(KEY_CREATED).cloned(),
        branches,
        entries: file_meta.num_rows(),
        row_groups: parquet_metadata.num_row_groups(),
        file_size_bytes,
    })
}
