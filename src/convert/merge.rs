use std::cell::RefCell;
use std::rc::Rc;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use log::{debug, info};

use super::{ConversionError, ConversionStats, DEFAULT_PROGRESS_INTERVAL, DEFAULT_READ_BATCH_SIZE};
use crate::record::{BoundRecord, HitInfo, MetaInfo};
use crate::schema::{FieldSource, SchemaBuilder};
use crate::table::{column, value_at, ColumnTable, RecordBatchIterator, TableError, EVENT_NUMBER};
use crate::tree::{EntrySink, Tree};
use crate::types::LeafValue;

/// Position of the meta cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// More meta rows may follow
    Active,
    /// The meta stream ran out; the cursor stays on its last row for good
    Exhausted,
}

/// A forward-only cursor over the meta table.
///
/// Rows are read lazily, one batch at a time. The cursor never moves
/// backward, and once the stream runs out it stays on the last row it read.
pub struct MetaCursor {
    batches: RecordBatchIterator,
    fields: Vec<String>,
    batch: Option<(ArrayRef, Vec<ArrayRef>)>,
    batch_len: usize,
    row: usize,
    state: CursorState,
    event: Option<u64>,
    values: Vec<LeafValue>,
    rows_read: u64,
}

impl MetaCursor {
    /// Open a cursor reading `fields` from `table`
    pub fn open(
        table: &dyn ColumnTable,
        fields: Vec<String>,
        batch_size: usize,
    ) -> Result<Self, ConversionError> {
        let mut cursor = Self {
            batches: table.iter_batches(batch_size)?,
            fields,
            batch: None,
            batch_len: 0,
            row: 0,
            state: CursorState::Active,
            event: None,
            values: Vec::new(),
            rows_read: 0,
        };
        cursor.load_row()?;
        Ok(cursor)
    }

    /// Current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Event number of the current row, `None` for an empty meta table
    pub fn event(&self) -> Option<u64> {
        self.event
    }

    /// Field values of the current row
    pub fn values(&self) -> &[LeafValue] {
        &self.values
    }

    /// Meta rows read so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn next_batch(&mut self) -> Result<bool, TableError> {
        for batch in self.batches.by_ref() {
            let batch: RecordBatch = batch?;
            if batch.num_rows() == 0 {
                continue;
            }
            let events = column(&batch, EVENT_NUMBER)?.clone();
            let columns = self
                .fields
                .iter()
                .map(|name| column(&batch, name).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            self.batch_len = batch.num_rows();
            self.batch = Some((events, columns));
            self.row = 0;
            return Ok(true);
        }
        Ok(false)
    }

    /// Read the row under the cursor, pulling the next batch if needed
    fn load_row(&mut self) -> Result<(), TableError> {
        if self.batch.is_none() || self.row >= self.batch_len {
            if !self.next_batch()? {
                self.state = CursorState::Exhausted;
                return Ok(());
            }
        }
        if let Some((events, columns)) = &self.batch {
            self.event = Some(value_at(events.as_ref(), self.row)?.as_u64());
            self.values = columns
                .iter()
                .map(|array| value_at(array.as_ref(), self.row))
                .collect::<Result<Vec<_>, _>>()?;
            self.rows_read += 1;
        }
        Ok(())
    }

    /// Advance one row; past the last row the cursor becomes exhausted
    pub fn advance(&mut self) -> Result<CursorState, ConversionError> {
        if self.state == CursorState::Active {
            self.row += 1;
            self.load_row()?;
        }
        Ok(self.state)
    }

    /// Move forward while the current event is below `event`.
    ///
    /// Returns the current row's values when its event equals `event`.
    /// With duplicate meta events the first matching row is used.
    pub fn seek(&mut self, event: u64) -> Result<Option<&[LeafValue]>, ConversionError> {
        while self.state == CursorState::Active {
            match self.event {
                Some(current) if current < event => {
                    self.advance()?;
                }
                _ => break,
            }
        }
        match self.event {
            Some(current) if current == event => Ok(Some(self.values.as_slice())),
            _ => Ok(None),
        }
    }
}

/// Row-mode conversion: one tree entry per hit, joined with its event's
/// meta timestamps.
///
/// The hit stream drives the loop and is read in batches; the meta stream is
/// a lazy [`MetaCursor`]. Running out of meta rows never ends the join:
/// the timestamps of the last matched event stay in the meta record for
/// every remaining hit.
#[derive(Debug, Clone)]
pub struct MergeJoinEngine {
    read_batch_size: usize,
    progress_interval: usize,
}

impl Default for MergeJoinEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeJoinEngine {
    /// Create an engine with default batch size and progress interval
    pub fn new() -> Self {
        Self {
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set the number of rows read per batch from either table
    pub fn with_read_batch_size(mut self, rows: usize) -> Self {
        self.read_batch_size = rows.max(1);
        self
    }

    /// Set how many hits pass between progress messages
    pub fn with_progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = rows.max(1);
        self
    }

    /// Join `hits` with `meta` and fill one entry per hit into `tree`
    pub fn run<S: EntrySink>(
        &self,
        hits: &dyn ColumnTable,
        meta: &dyn ColumnTable,
        tree: &mut Tree<S>,
    ) -> Result<ConversionStats, ConversionError> {
        let hit_record = Rc::new(RefCell::new(HitInfo::default()));
        let meta_record = Rc::new(RefCell::new(MetaInfo::default()));
        let hit = BoundRecord::new(&hit_record);
        let meta_bound = BoundRecord::new(&meta_record);

        let (schema, _) = SchemaBuilder::new(1)
            .with_records(hit.clone(), meta_bound.clone())
            .build(&hits.columns(), &meta.columns(), tree)?;

        let hit_fields: Vec<(String, usize)> = schema
            .fields_from(FieldSource::Hit)
            .filter_map(|f| f.member.map(|m| (f.name.clone(), m)))
            .collect();
        let meta_members: Vec<usize> = schema
            .fields_from(FieldSource::Meta)
            .filter_map(|f| f.member)
            .collect();
        let meta_fields: Vec<String> = schema
            .fields_from(FieldSource::Meta)
            .map(|f| f.name.clone())
            .collect();

        let mut cursor = MetaCursor::open(meta, meta_fields, self.read_batch_size)?;
        let total = hits.num_rows();
        let mut stats = ConversionStats::default();

        info!("Joining {} hits with {} meta rows", total, meta.num_rows());

        for batch in hits.iter_batches(self.read_batch_size)? {
            let batch = batch?;
            let events = column(&batch, EVENT_NUMBER)?;
            let columns = hit_fields
                .iter()
                .map(|(name, member)| column(&batch, name).map(|array| (array, *member)))
                .collect::<Result<Vec<_>, _>>()?;

            for row in 0..batch.num_rows() {
                for (array, member) in &columns {
                    hit.set(*member, value_at(array.as_ref(), row)?)?;
                }

                let event = value_at(events.as_ref(), row)?.as_u64();
                if let Some(values) = cursor.seek(event)? {
                    for (member, value) in meta_members.iter().zip(values) {
                        meta_bound.set(*member, *value)?;
                    }
                    stats.matched_rows += 1;
                }

                tree.fill()?;
                stats.hit_rows += 1;

                if stats.hit_rows % self.progress_interval as u64 == 0 {
                    let pct = stats.hit_rows as f64 / total.max(1) as f64 * 100.0;
                    info!("Progress: {}/{} hits ({:.1}%)", stats.hit_rows, total, pct);
                }
            }
        }

        if cursor.state() == CursorState::Exhausted {
            debug!("Meta stream exhausted after {} rows", cursor.rows_read());
        }

        stats.meta_rows_consumed = cursor.rows_read();
        stats.entries_written = tree.entries();
        info!(
            "Joined {} hits ({} with meta data)",
            stats.hit_rows, stats.matched_rows
        );
        Ok(stats)
    }
}
