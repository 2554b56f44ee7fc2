use std::cell::RefCell;
use std::rc::Rc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{Float64Type, UInt8Type};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::*;
use crate::record::{BoundRecord, HitInfo};
use crate::types::{ColumnBuffer, LeafType, StorageType};

fn tot_decl() -> BranchDecl {
    BranchDecl::scalar("tot", LeafType::UChar, StorageType::U8)
}

fn chunked_tree(capacity: usize) -> (Tree<MemorySink>, BranchId, ChunkSizeControl) {
    let mut tree = Tree::new("Table", "Converted HDF5 table", MemorySink::new());
    let count = tree.branch(BranchDecl::counter("n_entries")).unwrap();
    let tot = tree
        .branch(BranchDecl::repeated(
            "tot",
            LeafType::UChar,
            StorageType::U8,
            "n_entries",
            capacity,
        ))
        .unwrap();
    let control = ChunkSizeControl::new(capacity);
    tree.set_address(count, Binding::Counter(control.clone())).unwrap();
    (tree, tot, control)
}

fn u8_buffer(values: &[u8]) -> ColumnBuffer {
    ColumnBuffer::U8(values.to_vec())
}

#[test]
fn test_leaflist_strings() {
    assert_eq!(tot_decl().leaflist(), "tot/b");
    assert_eq!(BranchDecl::counter("n_entries").leaflist(), "n_entries/I");
    let repeated = BranchDecl::repeated("BCID", LeafType::UShort, StorageType::U16, "n_entries", 8);
    assert_eq!(repeated.leaflist(), "BCID[n_entries]/s");
}

#[test]
fn test_duplicate_branch_rejected() {
    let mut tree = Tree::new("t", "t", MemorySink::new());
    tree.branch(tot_decl()).unwrap();
    assert!(matches!(
        tree.branch(tot_decl()),
        Err(TreeError::DuplicateBranch(name)) if name == "tot"
    ));
}

#[test]
fn test_repeat_requires_declared_count_branch() {
    let mut tree = Tree::new("t", "t", MemorySink::new());
    let decl = BranchDecl::repeated("tot", LeafType::UChar, StorageType::U8, "n_entries", 4);
    assert!(matches!(
        tree.branch(decl),
        Err(TreeError::UnknownCountBranch { count_branch, .. }) if count_branch == "n_entries"
    ));
    assert!(tree.branches().is_empty());
}

#[test]
fn test_branches_frozen_after_fill() {
    let mut tree = Tree::new("t", "t", MemorySink::new());
    let tot = tree.branch(tot_decl()).unwrap();
    tree.set_address(tot, Binding::Buffer(u8_buffer(&[1]))).unwrap();
    tree.fill().unwrap();

    let late = BranchDecl::scalar("row", LeafType::UShort, StorageType::U16);
    assert!(matches!(tree.branch(late), Err(TreeError::Frozen(_))));
}

#[test]
fn test_fill_requires_every_branch_bound() {
    let mut tree = Tree::new("t", "t", MemorySink::new());
    tree.branch(tot_decl()).unwrap();
    assert!(matches!(tree.fill(), Err(TreeError::Unbound(name)) if name == "tot"));
    assert_eq!(tree.entries(), 0);
}

#[test]
fn test_bind_checks_storage() {
    let mut tree = Tree::new("t", "t", MemorySink::new());
    let tot = tree.branch(tot_decl()).unwrap();
    let wrong = ColumnBuffer::U16(vec![1]);
    assert!(matches!(
        tree.set_address(tot, Binding::Buffer(wrong)),
        Err(TreeError::TypeMismatch { .. })
    ));

    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let record = BoundRecord::new(&hit);
    assert!(matches!(
        tree.set_address(tot, Binding::Member { record, member: 42 }),
        Err(TreeError::RecordError(_))
    ));
    assert!(matches!(
        tree.set_address(BranchId(7), Binding::Unbound),
        Err(TreeError::NoSuchBranch(7))
    ));
}

#[test]
fn test_member_binding_rejects_repeated_branch() {
    let (mut tree, tot, _) = chunked_tree(4);
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let record = BoundRecord::new(&hit);
    let member = record.index_of("tot").unwrap();
    assert!(matches!(
        tree.set_address(tot, Binding::Member { record, member }),
        Err(TreeError::TypeMismatch { .. })
    ));
}

#[test]
fn test_member_value_cast_to_branch_storage() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let record = BoundRecord::new(&hit);

    let mut tree = Tree::new("t", "t", MemorySink::new());
    let event = tree
        .branch(BranchDecl::scalar("event_number", LeafType::Long64, StorageType::I64))
        .unwrap();
    let member = record.index_of("event_number").unwrap();
    tree.set_address(event, Binding::Member { record, member }).unwrap();

    hit.borrow_mut().event_number = 17;
    tree.fill().unwrap();
    let (sink, _) = tree.close().unwrap();
    assert_eq!(sink.scalars("event_number").unwrap(), vec![LeafValue::I64(17)]);
}

#[test]
fn test_member_binding_reads_record_at_fill() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let record = BoundRecord::new(&hit);

    let mut tree = Tree::new("t", "t", MemorySink::new());
    let tot = tree.branch(tot_decl()).unwrap();
    let member = record.index_of("tot").unwrap();
    tree.set_address(tot, Binding::Member { record, member }).unwrap();

    for value in [3u8, 5, 8] {
        hit.borrow_mut().tot = value;
        tree.fill().unwrap();
    }

    let (sink, stats) = tree.close().unwrap();
    assert_eq!(stats.entries_written, 3);
    assert_eq!(
        sink.scalars("tot").unwrap(),
        vec![LeafValue::U8(3), LeafValue::U8(5), LeafValue::U8(8)]
    );
}

#[test]
fn test_busy_record_fails_fill() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let record = BoundRecord::new(&hit);

    let mut tree = Tree::new("t", "t", MemorySink::new());
    let tot = tree.branch(tot_decl()).unwrap();
    let member = record.index_of("tot").unwrap();
    tree.set_address(tot, Binding::Member { record, member }).unwrap();

    let _guard = hit.borrow_mut();
    assert!(matches!(tree.fill(), Err(TreeError::RecordBusy(name)) if name == "tot"));
}

#[test]
fn test_chunk_fill_takes_active_rows() {
    let (mut tree, tot, control) = chunked_tree(4);

    tree.set_address(tot, Binding::Buffer(u8_buffer(&[1, 2, 3, 4]))).unwrap();
    control.set_active(4).unwrap();
    tree.fill().unwrap();

    tree.set_address(tot, Binding::Buffer(u8_buffer(&[5, 6, 99]))).unwrap();
    control.set_active(2).unwrap();
    tree.fill().unwrap();

    let (sink, stats) = tree.close().unwrap();
    assert_eq!(stats.entries_written, 2);
    assert_eq!(stats.values_written, 1 + 4 + 1 + 2);
    assert_eq!(
        sink.scalars("n_entries").unwrap(),
        vec![LeafValue::I32(4), LeafValue::I32(2)]
    );
    assert_eq!(
        sink.arrays("tot").unwrap(),
        vec![u8_buffer(&[1, 2, 3, 4]), u8_buffer(&[5, 6])]
    );
}

#[test]
fn test_buffer_consumed_by_fill() {
    let (mut tree, tot, control) = chunked_tree(4);
    tree.set_address(tot, Binding::Buffer(u8_buffer(&[1, 2]))).unwrap();
    control.set_active(2).unwrap();
    tree.fill().unwrap();

    assert!(matches!(tree.fill(), Err(TreeError::Unbound(name)) if name == "tot"));
    assert_eq!(tree.entries(), 1);
}

#[test]
fn test_short_buffer_rejected_without_consuming() {
    let (mut tree, tot, control) = chunked_tree(4);
    tree.set_address(tot, Binding::Buffer(u8_buffer(&[1]))).unwrap();
    control.set_active(3).unwrap();
    assert!(matches!(
        tree.fill(),
        Err(TreeError::ShortBuffer { needed: 3, available: 1, .. })
    ));

    control.set_active(1).unwrap();
    tree.fill().unwrap();
    assert_eq!(tree.entries(), 1);
}

#[test]
fn test_set_active_beyond_capacity() {
    let control = ChunkSizeControl::new(10);
    assert!(control.set_active(10).is_ok());
    assert!(matches!(
        control.set_active(11),
        Err(TreeError::ChunkOverflow { active: 11, capacity: 10 })
    ));
    assert_eq!(control.active(), 10);
}

#[test]
fn test_close_without_entries_opens_sink() {
    let mut tree = Tree::new("Table", "Converted HDF5 table", MemorySink::new());
    tree.branch(tot_decl()).unwrap();
    let (sink, stats) = tree.close().unwrap();
    assert!(sink.is_finished());
    assert_eq!(sink.name(), "Table");
    assert_eq!(sink.branches().len(), 1);
    assert_eq!(stats.entries_written, 0);
}

#[test]
fn test_parquet_sink_writes_lists_and_footer() {
    let mut out = Vec::new();
    {
        let config = TreeWriterConfig::default().with_batch_limits(1, 1_000);
        let mut tree = Tree::new("Table", "Converted HDF5 table", ParquetSink::new(&mut out, config));
        let count = tree.branch(BranchDecl::counter("n_entries")).unwrap();
        let tot = tree
            .branch(BranchDecl::repeated("tot", LeafType::UChar, StorageType::U8, "n_entries", 3))
            .unwrap();
        let start = tree
            .branch(BranchDecl::scalar("timestamp_start", LeafType::Double, StorageType::F64))
            .unwrap();
        let control = ChunkSizeControl::new(3);
        tree.set_address(count, Binding::Counter(control.clone())).unwrap();

        for (chunk, stamp) in [(vec![1u8, 2, 3], 0.5), (vec![4u8], 1.5)] {
            control.set_active(chunk.len()).unwrap();
            tree.set_address(tot, Binding::Buffer(ColumnBuffer::U8(chunk))).unwrap();
            tree.set_address(start, Binding::Buffer(ColumnBuffer::F64(vec![stamp])))
                .unwrap();
            tree.fill().unwrap();
        }
        let (_, stats) = tree.close().unwrap();
        assert_eq!(stats.entries_written, 2);
        assert!(stats.row_groups_written >= 1);
    }

    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(out)).unwrap();
    let kv = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .cloned()
        .unwrap_or_default();
    let lookup = |key: &str| {
        kv.iter()
            .find(|e| e.key == key)
            .and_then(|e| e.value.clone())
            .unwrap()
    };
    assert_eq!(lookup(KEY_TREE_NAME), "Table");
    assert_eq!(lookup(KEY_TREE_TITLE), "Converted HDF5 table");
    let branches: Vec<BranchInfo> = serde_json::from_str(&lookup(KEY_BRANCHES)).unwrap();
    let leaflists: Vec<_> = branches.iter().map(|b| b.leaflist.as_str()).collect();
    assert_eq!(leaflists, vec!["n_entries/I", "tot[n_entries]/b", "timestamp_start/D"]);

    let batches: Vec<_> = builder.build().unwrap().map(|b| b.unwrap()).collect();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 2);

    let batch = arrow::compute::concat_batches(&batches[0].schema(), &batches).unwrap();
    let lists = batch.column(1).as_list::<i32>();
    assert_eq!(lists.value_length(0), 3);
    assert_eq!(lists.value_length(1), 1);
    let second = lists.value(1);
    assert_eq!(second.as_primitive::<UInt8Type>().value(0), 4);
    let stamps = batch.column(2).as_primitive::<Float64Type>();
    assert_eq!(stamps.values().to_vec(), vec![0.5, 1.5]);
    assert_eq!(stamps.null_count(), 0);
}

#[test]
fn test_tree_file_info_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.parquet");

    let mut tree = TreeFile::create(&path, TreeWriterConfig::fast_write()).unwrap();
    let tot = tree.branch(tot_decl()).unwrap();
    for value in 0..5u8 {
        tree.set_address(tot, Binding::Buffer(u8_buffer(&[value]))).unwrap();
        tree.fill().unwrap();
    }
    tree.close().unwrap();

    let info = read_tree_info(&path).unwrap();
    assert_eq!(info.name, DEFAULT_TREE_NAME);
    assert_eq!(info.title, DEFAULT_TREE_TITLE);
    assert_eq!(info.format_version, FORMAT_VERSION);
    assert_eq!(info.entries, 5);
    assert_eq!(info.branches, vec![tot_decl().info()]);
    assert!(info.created.is_some());
    assert!(info.file_size_bytes > 0);
}
