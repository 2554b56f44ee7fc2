use log::{debug, info};

use super::merge::MetaCursor;
use super::{ConversionError, ConversionStats, DEFAULT_PROGRESS_INTERVAL, DEFAULT_READ_BATCH_SIZE};
use crate::schema::{FieldSource, OutputField, SchemaBuilder};
use crate::table::{column, stage_column, value_at, ColumnTable, EVENT_NUMBER};
use crate::tree::{Binding, BranchId, EntrySink, Tree};
use crate::types::{ColumnBuffer, LeafValue};

/// Bulk-mode conversion: one tree entry per window of `chunk_size` hits.
///
/// Each window is read with one positional range read and re-packed into
/// freshly allocated column buffers, one per field. The buffers are moved
/// into the tree, written by `fill()` and dropped before the next window is
/// read, so exactly one chunk is in memory at a time. The final window may
/// be short; its entry carries `n_entries < chunk_size`.
#[derive(Debug, Clone)]
pub struct ChunkedBulkWriter {
    chunk_size: usize,
    meta_batch_size: usize,
    progress_interval: usize,
}

impl ChunkedBulkWriter {
    /// Create a writer for windows of `chunk_size` rows.
    ///
    /// `chunk_size` must be above 1 and fit the 32-bit `n_entries` branch.
    pub fn new(chunk_size: usize) -> Result<Self, ConversionError> {
        if chunk_size <= 1 {
            return Err(ConversionError::Configuration(format!(
                "bulk mode needs a chunk size above 1, got {}",
                chunk_size
            )));
        }
        if i32::try_from(chunk_size).is_err() {
            return Err(ConversionError::Configuration(format!(
                "chunk size {} exceeds the n_entries range ({})",
                chunk_size,
                i32::MAX
            )));
        }
        Ok(Self {
            chunk_size,
            meta_batch_size: DEFAULT_READ_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        })
    }

    /// Rows per window
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Set the number of rows read per batch from the meta table
    pub fn with_meta_batch_size(mut self, rows: usize) -> Self {
        self.meta_batch_size = rows.max(1);
        self
    }

    /// Set how many hits pass between progress messages
    pub fn with_progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = rows.max(1);
        self
    }

    /// Write `hits` into `tree` chunk by chunk.
    ///
    /// With a meta table the timestamp fields are filled per hit using the
    /// same cursor policy as row mode; without one they are not declared.
    pub fn run<S: EntrySink>(
        &self,
        hits: &dyn ColumnTable,
        meta: Option<&dyn ColumnTable>,
        tree: &mut Tree<S>,
    ) -> Result<ConversionStats, ConversionError> {
        let meta_columns = meta.map(|m| m.columns()).unwrap_or_default();
        let (schema, control) =
            SchemaBuilder::new(self.chunk_size).build(&hits.columns(), &meta_columns, tree)?;
        let control = control.ok_or_else(|| {
            ConversionError::Configuration("chunked schema has no count branch".to_string())
        })?;

        let hit_fields: Vec<&OutputField> = schema.fields_from(FieldSource::Hit).collect();
        let meta_fields: Vec<&OutputField> = schema.fields_from(FieldSource::Meta).collect();

        let mut cursor = match meta {
            Some(table) if !meta_fields.is_empty() => Some(MetaCursor::open(
                table,
                meta_fields.iter().map(|f| f.name.clone()).collect(),
                self.meta_batch_size,
            )?),
            _ => None,
        };
        // Last matched meta values, carried across rows and windows
        let mut current_meta: Vec<LeafValue> = meta_fields
            .iter()
            .map(|f| LeafValue::zero(f.storage))
            .collect();

        let total = hits.num_rows();
        let mut stats = ConversionStats::default();
        info!(
            "Writing {} hits in chunks of {} ({} chunks)",
            total,
            self.chunk_size,
            total.div_ceil(self.chunk_size)
        );

        let mut next_progress = self.progress_interval;
        for start in (0..total).step_by(self.chunk_size) {
            let stop = (start + self.chunk_size).min(total);
            let window = hits.read_range(start, stop)?;
            let rows = window.num_rows();

            for field in &hit_fields {
                let array = column(&window, &field.name)?;
                let buffer = stage_column(array.as_ref(), field.storage, self.chunk_size)?;
                tree.set_address(branch_of(field)?, Binding::Buffer(buffer))?;
            }

            if let Some(cursor) = cursor.as_mut() {
                let mut buffers: Vec<ColumnBuffer> = meta_fields
                    .iter()
                    .map(|f| ColumnBuffer::with_capacity(f.storage, self.chunk_size))
                    .collect();
                let events = column(&window, EVENT_NUMBER)?;
                for row in 0..rows {
                    let event = value_at(events.as_ref(), row)?.as_u64();
                    if let Some(values) = cursor.seek(event)? {
                        current_meta.copy_from_slice(values);
                        stats.matched_rows += 1;
                    }
                    for (buffer, value) in buffers.iter_mut().zip(&current_meta) {
                        buffer.push(*value);
                    }
                }
                for (field, buffer) in meta_fields.iter().zip(buffers) {
                    tree.set_address(branch_of(field)?, Binding::Buffer(buffer))?;
                }
            }

            control.set_active(rows)?;
            tree.fill()?;

            stats.hit_rows += rows as u64;
            stats.chunks_written += 1;
            debug!("Chunk {} [{}, {}) written", stats.chunks_written, start, stop);

            if stop >= next_progress {
                let pct = stop as f64 / total.max(1) as f64 * 100.0;
                info!("Progress: {}/{} hits ({:.1}%)", stop, total, pct);
                next_progress = stop + self.progress_interval;
            }
        }

        if let Some(cursor) = &cursor {
            stats.meta_rows_consumed = cursor.rows_read();
        }
        stats.entries_written = tree.entries();
        info!(
            "Wrote {} hits in {} chunks",
            stats.hit_rows, stats.chunks_written
        );
        Ok(stats)
    }
}

fn branch_of(field: &OutputField) -> Result<BranchId, ConversionError> {
    field.branch.ok_or_else(|| {
        ConversionError::Configuration(format!("field {} has no branch", field.name))
    })
}
