use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, UInt16Array, UInt32Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;

use super::*;
use crate::schema::CHUNK_SIZE_FIELD;
use crate::table::{MemoryTable, SEMANTIC_TYPE_KEY};
use crate::tree::MemorySink;
use crate::types::{ColumnBuffer, LeafValue, UnsupportedTypeError};

fn hit_table(events: &[i64]) -> MemoryTable {
    let n = events.len();
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::Int64, false),
        Field::new("column", DataType::UInt8, false),
        Field::new("row", DataType::UInt16, false),
        Field::new("tot", DataType::UInt8, false),
        Field::new("BCID", DataType::UInt16, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(events.to_vec())),
        Arc::new(UInt8Array::from_iter_values((0..n).map(|i| (i % 80) as u8 + 1))),
        Arc::new(UInt16Array::from_iter_values((0..n).map(|i| (i % 336) as u16 + 1))),
        Arc::new(UInt8Array::from_iter_values((0..n).map(|i| (i % 14) as u8))),
        Arc::new(UInt16Array::from_iter_values((0..n).map(|i| i as u16))),
    ];
    MemoryTable::new(HIT_TABLE, RecordBatch::try_new(schema, columns).unwrap())
}

fn sequential_hits(n: usize) -> MemoryTable {
    let events: Vec<i64> = (0..n as i64).map(|i| i / 4).collect();
    hit_table(&events)
}

fn meta_table(rows: &[(i64, f64, f64)]) -> MemoryTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::Int64, false),
        Field::new("timestamp_start", DataType::Float64, false),
        Field::new("timestamp_stop", DataType::Float64, false),
        Field::new("error_code", DataType::UInt32, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.1))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.2))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|_| 0))),
    ];
    MemoryTable::new(META_TABLE, RecordBatch::try_new(schema, columns).unwrap())
}

fn memory_tree() -> Tree<MemorySink> {
    Tree::new("Table", "Converted HDF5 table", MemorySink::new())
}

fn run_rows(hits: &MemoryTable, meta: &MemoryTable) -> (MemorySink, ConversionStats) {
    let mut tree = memory_tree();
    let stats = MergeJoinEngine::new()
        .with_read_batch_size(2)
        .run(hits, meta, &mut tree)
        .unwrap();
    let (sink, _) = tree.close().unwrap();
    (sink, stats)
}

fn timestamps(sink: &MemorySink) -> Vec<(f64, f64)> {
    let starts = sink.scalars("timestamp_start").unwrap();
    let stops = sink.scalars("timestamp_stop").unwrap();
    starts
        .into_iter()
        .zip(stops)
        .map(|(a, b)| (a.as_f64(), b.as_f64()))
        .collect()
}

#[test]
fn test_row_mode_joins_timestamps() {
    let hits = hit_table(&[1, 1, 2]);
    let meta = meta_table(&[(1, 10.0, 11.0), (2, 20.0, 21.0)]);
    let (sink, stats) = run_rows(&hits, &meta);

    assert_eq!(
        timestamps(&sink),
        vec![(10.0, 11.0), (10.0, 11.0), (20.0, 21.0)]
    );
    assert_eq!(stats.hit_rows, 3);
    assert_eq!(stats.matched_rows, 3);
    assert_eq!(stats.entries_written, 3);
}

#[test]
fn test_row_mode_keeps_stale_timestamps_after_meta_exhausted() {
    let hits = hit_table(&[1, 2, 3]);
    let meta = meta_table(&[(1, 10.0, 11.0)]);
    let (sink, stats) = run_rows(&hits, &meta);

    assert_eq!(timestamps(&sink), vec![(10.0, 11.0); 3]);
    assert_eq!(stats.matched_rows, 1);
    assert_eq!(stats.meta_rows_consumed, 1);
}

#[test]
fn test_row_mode_gap_in_meta_keeps_previous_values() {
    let hits = hit_table(&[0, 1, 2, 3, 3]);
    let meta = meta_table(&[(1, 10.0, 11.0), (3, 30.0, 31.0)]);
    let (sink, _) = run_rows(&hits, &meta);

    assert_eq!(
        timestamps(&sink),
        vec![
            (0.0, 0.0),
            (10.0, 11.0),
            (10.0, 11.0),
            (30.0, 31.0),
            (30.0, 31.0)
        ]
    );
}

#[test]
fn test_row_mode_empty_meta_leaves_zero_timestamps() {
    let hits = hit_table(&[1, 2]);
    let meta = meta_table(&[]);
    let (sink, stats) = run_rows(&hits, &meta);

    assert_eq!(timestamps(&sink), vec![(0.0, 0.0), (0.0, 0.0)]);
    assert_eq!(stats.hit_rows, 2);
    assert_eq!(stats.matched_rows, 0);
}

#[test]
fn test_row_mode_duplicate_meta_event_uses_first_row() {
    let hits = hit_table(&[5, 5]);
    let meta = meta_table(&[(5, 1.0, 2.0), (5, 3.0, 4.0)]);
    let (sink, _) = run_rows(&hits, &meta);

    assert_eq!(timestamps(&sink), vec![(1.0, 2.0), (1.0, 2.0)]);
}

#[test]
fn test_row_mode_follows_meta_column_order() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::UInt32, false),
        Field::new("timestamp_stop", DataType::Float64, false),
        Field::new("timestamp_start", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(vec![1, 2])),
        Arc::new(Float64Array::from(vec![11.0, 21.0])),
        Arc::new(Float64Array::from(vec![10.0, 20.0])),
    ];
    let meta = MemoryTable::new(META_TABLE, RecordBatch::try_new(schema, columns).unwrap());
    let hits = hit_table(&[1, 2, 2]);
    let (sink, _) = run_rows(&hits, &meta);

    let names: Vec<&str> = sink.branches().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(&names[5..], &["timestamp_stop", "timestamp_start"]);
    assert_eq!(
        timestamps(&sink),
        vec![(10.0, 11.0), (20.0, 21.0), (20.0, 21.0)]
    );
}

#[test]
fn test_row_mode_preserves_hit_values_and_count() {
    let hits = sequential_hits(37);
    let meta = meta_table(&(0..10).map(|e| (e, e as f64, e as f64 + 0.5)).collect::<Vec<_>>());
    let (sink, stats) = run_rows(&hits, &meta);

    assert_eq!(sink.entries().len(), 37);
    assert_eq!(stats.hit_rows, 37);
    let events = sink.scalars("event_number").unwrap();
    assert_eq!(events[36], LeafValue::I64(9));
    let bcid = sink.scalars("BCID").unwrap();
    assert_eq!(bcid[20], LeafValue::U16(20));
    assert_eq!(timestamps(&sink)[36], (9.0, 9.5));
}

#[test]
fn test_row_mode_truncates_to_member_width() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::Int64, false),
        Field::new("tot", DataType::UInt16, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(UInt16Array::from(vec![300])),
        ],
    )
    .unwrap();
    let hits = MemoryTable::new(HIT_TABLE, batch);
    let (sink, _) = run_rows(&hits, &meta_table(&[]));

    assert_eq!(sink.scalars("tot").unwrap(), vec![LeafValue::U16(44)]);
}

#[test]
fn test_row_mode_unknown_hit_column_is_configuration_error() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::Int64, false),
        Field::new("charge", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(Float64Array::from(vec![0.5])),
        ],
    )
    .unwrap();
    let hits = MemoryTable::new(HIT_TABLE, batch);

    let mut tree = memory_tree();
    let err = MergeJoinEngine::new()
        .run(&hits, &meta_table(&[]), &mut tree)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::SchemaError(SchemaError::Configuration(_))
    ));
    assert!(tree.branches().is_empty());
}

#[test]
fn test_unsupported_type_aborts_before_any_write() {
    let field = Field::new("event_status", DataType::Float64, false).with_metadata(
        HashMap::from([(SEMANTIC_TYPE_KEY.to_string(), "complex128".to_string())]),
    );
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::Int64, false),
        field,
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Float64Array::from(vec![0.0, 1.0])),
        ],
    )
    .unwrap();
    let hits = MemoryTable::new(HIT_TABLE, batch);

    for mode in [ConversionMode::Row, ConversionMode::Bulk { chunk_size: 4 }] {
        let mut tree = memory_tree();
        let converter =
            HitTreeConverter::with_config(ConversionConfig::default().with_mode(mode));
        let err = converter
            .convert_tables(&hits, Some(&meta_table(&[])), &mut tree)
            .unwrap_err();
        assert!(matches!(
            err,
            ConversionError::SchemaError(SchemaError::UnsupportedType(UnsupportedTypeError { ref type_name }))
                if type_name == "complex128"
        ));
        assert!(tree.branches().is_empty());
        assert_eq!(tree.entries(), 0);
    }
}

#[test]
fn test_bulk_mode_chunks_with_short_tail() {
    let hits = sequential_hits(23);
    let mut tree = memory_tree();
    let stats = ChunkedBulkWriter::new(10)
        .unwrap()
        .run(&hits, None, &mut tree)
        .unwrap();
    let (sink, _) = tree.close().unwrap();

    assert_eq!(stats.chunks_written, 3);
    assert_eq!(stats.hit_rows, 23);
    assert_eq!(sink.branches()[0].name, CHUNK_SIZE_FIELD);
    assert_eq!(
        sink.scalars(CHUNK_SIZE_FIELD).unwrap(),
        vec![LeafValue::I32(10), LeafValue::I32(10), LeafValue::I32(3)]
    );

    let bcid = sink.arrays("BCID").unwrap();
    let lengths: Vec<usize> = bcid.iter().map(ColumnBuffer::len).collect();
    assert_eq!(lengths, vec![10, 10, 3]);
    assert_eq!(bcid[2], ColumnBuffer::U16(vec![20, 21, 22]));
    assert!(sink.scalars("timestamp_start").is_none());
}

#[test]
fn test_bulk_mode_exact_multiple_has_no_empty_chunk() {
    let hits = sequential_hits(20);
    let mut tree = memory_tree();
    let stats = ChunkedBulkWriter::new(10)
        .unwrap()
        .run(&hits, None, &mut tree)
        .unwrap();
    assert_eq!(stats.chunks_written, 2);
}

#[test]
fn test_bulk_mode_zero_rows_writes_no_chunks() {
    let hits = hit_table(&[]);
    let mut tree = memory_tree();
    let stats = ChunkedBulkWriter::new(10)
        .unwrap()
        .run(&hits, None, &mut tree)
        .unwrap();
    let (sink, _) = tree.close().unwrap();

    assert_eq!(stats.chunks_written, 0);
    assert!(sink.entries().is_empty());
    assert_eq!(sink.branches().len(), 6);
}

#[test]
fn test_bulk_mode_rejects_chunk_size_one() {
    assert!(matches!(
        ChunkedBulkWriter::new(1),
        Err(ConversionError::Configuration(_))
    ));
    assert!(matches!(
        ChunkedBulkWriter::new(0),
        Err(ConversionError::Configuration(_))
    ));
}

#[test]
fn test_bulk_mode_rejects_chunk_size_beyond_count_range() {
    let limit = i32::MAX as usize;
    assert!(matches!(
        ChunkedBulkWriter::new(limit + 1),
        Err(ConversionError::Configuration(msg)) if msg.contains("n_entries")
    ));
    assert_eq!(ChunkedBulkWriter::new(limit).unwrap().chunk_size(), limit);
}

#[test]
fn test_bulk_mode_carries_timestamps_across_windows() {
    let hits = hit_table(&[1, 1, 2, 3, 4]);
    let meta = meta_table(&[(1, 10.0, 11.0), (2, 20.0, 21.0), (4, 40.0, 41.0)]);
    let mut tree = memory_tree();
    let stats = ChunkedBulkWriter::new(2)
        .unwrap()
        .with_meta_batch_size(1)
        .run(&hits, Some(&meta), &mut tree)
        .unwrap();
    let (sink, _) = tree.close().unwrap();

    assert_eq!(stats.chunks_written, 3);
    assert_eq!(stats.matched_rows, 4);
    assert_eq!(
        sink.arrays("timestamp_start").unwrap(),
        vec![
            ColumnBuffer::F64(vec![10.0, 10.0]),
            ColumnBuffer::F64(vec![20.0, 20.0]),
            ColumnBuffer::F64(vec![40.0]),
        ]
    );
}

#[test]
fn test_row_mode_requires_meta_table() {
    let hits = hit_table(&[1]);
    let mut tree = memory_tree();
    let err = HitTreeConverter::new()
        .convert_tables(&hits, None, &mut tree)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::TableError(TableError::TableNotFound(_))
    ));
}

#[test]
fn test_meta_cursor_walks_batches_and_stays_on_last_row() {
    let meta = meta_table(&[(1, 1.0, 1.5), (2, 2.0, 2.5), (3, 3.0, 3.5)]);
    let mut cursor = MetaCursor::open(&meta, vec!["timestamp_stop".to_string()], 2).unwrap();

    assert_eq!(cursor.event(), Some(1));
    assert_eq!(cursor.seek(3).unwrap(), Some(&[LeafValue::F64(3.5)][..]));
    assert_eq!(cursor.state(), CursorState::Active);

    assert_eq!(cursor.seek(9).unwrap(), None);
    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert_eq!(cursor.event(), Some(3));
    assert_eq!(cursor.values(), &[LeafValue::F64(3.5)]);

    assert_eq!(cursor.advance().unwrap(), CursorState::Exhausted);
    assert_eq!(cursor.rows_read(), 3);
}

#[test]
fn test_meta_cursor_never_moves_backward() {
    let meta = meta_table(&[(1, 1.0, 1.5), (2, 2.0, 2.5)]);
    let mut cursor = MetaCursor::open(&meta, vec!["timestamp_start".to_string()], 8).unwrap();
    cursor.seek(2).unwrap();
    assert_eq!(cursor.seek(1).unwrap(), None);
    assert_eq!(cursor.event(), Some(2));
}

#[test]
fn test_converter_writes_tree_file() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = TableBundle::create(dir.path().join("run")).unwrap();
    bundle
        .write_table(HIT_TABLE, sequential_hits(12).batch())
        .unwrap();
    bundle
        .write_table(META_TABLE, meta_table(&[(0, 1.0, 2.0), (2, 3.0, 4.0)]).batch())
        .unwrap();
    let output = dir.path().join("run.tree.parquet");

    let stats = HitTreeConverter::new().convert(bundle.path(), &output).unwrap();
    assert_eq!(stats.entries_written, 12);
    assert_eq!(stats.matched_rows, 8);
    assert!(stats.output_file_size > 0);

    let info = crate::tree::read_tree_info(&output).unwrap();
    assert_eq!(info.entries, 12);
    assert_eq!(info.branches.len(), 7);
}

#[test]
fn test_converter_removes_partial_output_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = TableBundle::create(dir.path().join("run")).unwrap();
    bundle
        .write_table(HIT_TABLE, sequential_hits(4).batch())
        .unwrap();
    let output = dir.path().join("out.parquet");

    let err = HitTreeConverter::new()
        .convert(bundle.path(), &output)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::TableError(TableError::TableNotFound(_))
    ));
    assert!(!output.exists());
}

/// Meta rows numbered by position, timestamps `i` and `i + 0.5`
fn numbered_meta(events: &[i64]) -> Vec<(i64, f64, f64)> {
    events
        .iter()
        .enumerate()
        .map(|(i, &e)| (e, i as f64, i as f64 + 0.5))
        .collect()
}

/// Straightforward join: first meta row of the hit's event, else the last match
fn joined_timestamps(hits: &[i64], meta: &[(i64, f64, f64)]) -> Vec<(f64, f64)> {
    let mut current = (0.0, 0.0);
    hits.iter()
        .map(|&event| {
            if let Some(row) = meta.iter().find(|row| row.0 == event) {
                current = (row.1, row.2);
            }
            current
        })
        .collect()
}

fn sorted_events(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..24, 0..max_len).prop_map(|mut events| {
        events.sort_unstable();
        events
    })
}

proptest! {
    /// Every hit gets the timestamps of its event's first meta row, or
    /// keeps the last matched ones when its event has none.
    #[test]
    fn prop_row_mode_matches_reference_join(
        hit_events in sorted_events(60),
        meta_events in sorted_events(20),
    ) {
        let meta_rows = numbered_meta(&meta_events);
        let (sink, stats) = run_rows(&hit_table(&hit_events), &meta_table(&meta_rows));

        prop_assert_eq!(stats.hit_rows, hit_events.len() as u64);
        prop_assert_eq!(sink.entries().len(), hit_events.len());
        prop_assert_eq!(timestamps(&sink), joined_timestamps(&hit_events, &meta_rows));
    }

    /// Windows cover every hit exactly once, and flattened window contents
    /// carry the same timestamps as row mode.
    #[test]
    fn prop_bulk_mode_covers_every_hit(
        hit_events in sorted_events(60),
        meta_events in sorted_events(20),
        chunk_size in 2usize..9,
    ) {
        let meta_rows = numbered_meta(&meta_events);
        let hits = hit_table(&hit_events);
        let meta = meta_table(&meta_rows);
        let mut tree = memory_tree();
        let stats = ChunkedBulkWriter::new(chunk_size)
            .unwrap()
            .with_meta_batch_size(3)
            .run(&hits, Some(&meta), &mut tree)
            .unwrap();
        let (sink, _) = tree.close().unwrap();

        let counts: Vec<u64> = sink
            .scalars(CHUNK_SIZE_FIELD)
            .unwrap()
            .into_iter()
            .map(LeafValue::as_u64)
            .collect();
        prop_assert_eq!(counts.iter().sum::<u64>(), hit_events.len() as u64);
        prop_assert_eq!(stats.chunks_written, hit_events.len().div_ceil(chunk_size) as u64);
        prop_assert!(counts.iter().all(|&n| n >= 1 && n as usize <= chunk_size));

        let flatten = |name: &str| -> Vec<f64> {
            sink.arrays(name)
                .unwrap()
                .iter()
                .flat_map(|b| (0..b.len()).map(move |i| b.get(i).unwrap().as_f64()))
                .collect()
        };
        let events: Vec<i64> = sink
            .arrays("event_number")
            .unwrap()
            .iter()
            .flat_map(|b| (0..b.len()).map(move |i| b.get(i).unwrap().as_u64() as i64))
            .collect();
        prop_assert_eq!(events, hit_events.clone());

        let expected = joined_timestamps(&hit_events, &meta_rows);
        let flattened: Vec<(f64, f64)> = flatten("timestamp_start")
            .into_iter()
            .zip(flatten("timestamp_stop"))
            .collect();
        prop_assert_eq!(flattened, expected);
    }
}
