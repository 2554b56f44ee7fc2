use log::{debug, info};

use super::{
    FieldSource, OutputField, OutputSchema, SchemaError, CHUNK_SIZE_FIELD, META_FIELDS,
};
use crate::record::BoundRecord;
use crate::table::ColumnDesc;
use crate::tree::{Binding, BranchDecl, ChunkSizeControl, EntrySink, Repeat, Tree};

/// Builds an [`OutputSchema`] and registers it on a tree.
///
/// # Example
///
/// ```rust
/// use hittree::schema::SchemaBuilder;
/// use hittree::table::ColumnDesc;
/// use hittree::tree::{MemorySink, Tree};
///
/// let hits = vec![ColumnDesc::new("event_number", "int64"), ColumnDesc::new("tot", "uint8")];
/// let mut tree = Tree::new("Table", "Converted HDF5 table", MemorySink::new());
///
/// let (schema, control) = SchemaBuilder::new(100).build(&hits, &[], &mut tree)?;
/// assert!(control.is_some());
/// assert_eq!(tree.branches()[0].leaflist(), "n_entries/I");
/// assert_eq!(tree.branches()[2].leaflist(), "tot[n_entries]/b");
/// assert_eq!(schema.names(), vec!["event_number", "tot"]);
/// # Ok::<(), hittree::schema::SchemaError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    chunk_size: usize,
    hit_record: Option<BoundRecord>,
    meta_record: Option<BoundRecord>,
}

impl SchemaBuilder {
    /// Builder for entries of `chunk_size` rows (1 for row mode)
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            hit_record: None,
            meta_record: None,
        }
    }

    /// Bind branches to members of these records
    pub fn with_records(mut self, hit: BoundRecord, meta: BoundRecord) -> Self {
        self.hit_record = Some(hit);
        self.meta_record = Some(meta);
        self
    }

    /// Bind hit branches to members of this record
    pub fn with_hit_record(mut self, hit: BoundRecord) -> Self {
        self.hit_record = Some(hit);
        self
    }

    /// Bind meta branches to members of this record
    pub fn with_meta_record(mut self, meta: BoundRecord) -> Self {
        self.meta_record = Some(meta);
        self
    }

    /// Rows per entry
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.chunk_size == 0 {
            return Err(SchemaError::Configuration(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.hit_record.is_some() && self.meta_record.is_some() && self.chunk_size > 1 {
            return Err(SchemaError::Configuration(format!(
                "records cannot be bound to a chunked tree (chunk size {})",
                self.chunk_size
            )));
        }
        Ok(())
    }

    /// Derive the output schema without touching a tree.
    ///
    /// Deterministic: the same columns always give the same schema.
    pub fn plan(
        &self,
        hit_columns: &[ColumnDesc],
        meta_columns: &[ColumnDesc],
    ) -> Result<OutputSchema, SchemaError> {
        self.validate()?;

        let repeat = (self.chunk_size > 1).then(|| Repeat {
            count_branch: CHUNK_SIZE_FIELD.to_string(),
            capacity: self.chunk_size,
        });

        let kept_meta = meta_columns
            .iter()
            .filter(|c| META_FIELDS.contains(&c.name.as_str()));
        let columns = hit_columns
            .iter()
            .map(|c| (c, FieldSource::Hit))
            .chain(kept_meta.map(|c| (c, FieldSource::Meta)));

        let mut fields = Vec::new();
        for (column, source) in columns {
            let info = column.resolve()?;
            fields.push(OutputField {
                name: column.name.clone(),
                semantic: info.semantic,
                leaf: info.leaf,
                storage: info.storage,
                repeat: repeat.clone(),
                source,
                branch: None,
                member: None,
            });
        }

        Ok(OutputSchema {
            fields,
            chunk_size: self.chunk_size,
        })
    }

    fn record_for(&self, source: FieldSource) -> Option<&BoundRecord> {
        match source {
            FieldSource::Hit => self.hit_record.as_ref(),
            FieldSource::Meta => self.meta_record.as_ref(),
        }
    }

    /// Look up the record member of every field; all-or-nothing.
    ///
    /// Fields whose record was not supplied stay unbound.
    fn resolve_members(&self, schema: &mut OutputSchema) -> Result<(), SchemaError> {
        for field in &mut schema.fields {
            let record = match self.record_for(field.source) {
                Some(record) => record,
                None => continue,
            };
            if field.repeat.is_some() {
                return Err(SchemaError::Configuration(format!(
                    "record {} cannot back repeated field {}",
                    record.name(),
                    field.name
                )));
            }
            let index = record.index_of(&field.name).map_err(|_| {
                SchemaError::Configuration(format!(
                    "record {} has no member for field {}",
                    record.name(),
                    field.name
                ))
            })?;
            field.member = Some(index);
        }
        Ok(())
    }

    /// Build the schema and register its branches on `tree`.
    ///
    /// Returns the schema (with branch ids filled in) and, for chunked trees,
    /// the control holding the active row count of the current chunk.
    pub fn build<S: EntrySink>(
        &self,
        hit_columns: &[ColumnDesc],
        meta_columns: &[ColumnDesc],
        tree: &mut Tree<S>,
    ) -> Result<(OutputSchema, Option<ChunkSizeControl>), SchemaError> {
        let mut schema = self.plan(hit_columns, meta_columns)?;
        self.resolve_members(&mut schema)?;

        let control = if schema.is_chunked() {
            let control = ChunkSizeControl::new(self.chunk_size);
            let id = tree.branch(BranchDecl::counter(CHUNK_SIZE_FIELD))?;
            tree.set_address(id, Binding::Counter(control.clone()))?;
            Some(control)
        } else {
            None
        };

        for field in &mut schema.fields {
            let decl = BranchDecl {
                name: field.name.clone(),
                leaf: field.leaf,
                storage: field.storage,
                repeat: field.repeat.clone(),
            };
            let id = tree.branch(decl)?;
            if let (Some(record), Some(member)) = (self.record_for(field.source), field.member) {
                tree.set_address(
                    id,
                    Binding::Member {
                        record: record.clone(),
                        member,
                    },
                )?;
            }
            field.branch = Some(id);
            debug!("Field {} -> {:?} ({:?})", field.name, field.leaf, field.source);
        }

        info!(
            "Output schema: {} fields, chunk size {}",
            schema.len(),
            schema.chunk_size()
        );
        Ok((schema, control))
    }
}
