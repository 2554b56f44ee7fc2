use super::*;

fn packed_size(members: &[Member]) -> usize {
    members.iter().map(|m| m.storage.width()).sum()
}

#[test]
fn test_layouts_are_packed() {
    assert_eq!(std::mem::size_of::<HitInfo>(), packed_size(HitInfo::MEMBERS));
    assert_eq!(std::mem::size_of::<MetaInfo>(), packed_size(MetaInfo::MEMBERS));
}

#[test]
fn test_members_do_not_overlap() {
    for members in [HitInfo::MEMBERS, MetaInfo::MEMBERS] {
        let mut end = 0;
        for member in members {
            assert_eq!(member.offset, end, "member {} is not contiguous", member.name);
            end = member.range().end;
        }
    }
}

#[test]
fn test_hit_member_names() {
    let names: Vec<_> = HitInfo::MEMBERS.iter().map(|m| m.name).collect();
    assert_eq!(
        names,
        vec![
            "event_number",
            "trigger_number",
            "relative_BCID",
            "LVL1ID",
            "column",
            "row",
            "tot",
            "BCID",
            "TDC",
            "TDC_time_stamp",
            "trigger_status",
            "service_record",
            "event_status",
        ]
    );
    assert_eq!(HitInfo::member("BCID").unwrap().storage, StorageType::U16);
    assert!(HitInfo::member("bcid").is_none());
}

#[test]
fn test_set_writes_through_to_record() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let bound = BoundRecord::new(&hit);

    let event = bound.index_of("event_number").unwrap();
    let bcid = bound.index_of("BCID").unwrap();
    bound.set(event, LeafValue::U32(42)).unwrap();
    bound.set(bcid, LeafValue::U16(0xBEEF)).unwrap();

    let record = *hit.borrow();
    assert_eq!({ record.event_number }, 42);
    assert_eq!({ record.bcid }, 0xBEEF);
    assert_eq!(bound.get(bcid).unwrap(), LeafValue::U16(0xBEEF));
}

#[test]
fn test_set_truncates_to_member_width() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let bound = BoundRecord::new(&hit);

    let tot = bound.index_of("tot").unwrap();
    bound.set(tot, LeafValue::U16(258)).unwrap();
    assert_eq!(bound.get(tot).unwrap(), LeafValue::U8(2));
}

#[test]
fn test_reads_see_direct_writes() {
    let meta = Rc::new(RefCell::new(MetaInfo::default()));
    let bound = BoundRecord::new(&meta);
    meta.borrow_mut().timestamp_start = 1.25;

    let start = bound.index_of("timestamp_start").unwrap();
    assert_eq!(bound.get(start).unwrap(), LeafValue::F64(1.25));
}

#[test]
fn test_unknown_member() {
    let meta = Rc::new(RefCell::new(MetaInfo::default()));
    let bound = BoundRecord::new(&meta);
    assert_eq!(
        bound.index_of("tot"),
        Err(RecordError::UnknownMember {
            record: "MetaInfo",
            member: "tot".to_string()
        })
    );
    assert!(matches!(bound.get(99), Err(RecordError::BadIndex { index: 99, .. })));
}

#[test]
fn test_busy_record_reports_error() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let bound = BoundRecord::new(&hit);
    let _guard = hit.borrow_mut();
    assert_eq!(bound.get(0), Err(RecordError::Busy("HitInfo")));
}

#[test]
fn test_clones_share_record() {
    let hit = Rc::new(RefCell::new(HitInfo::default()));
    let a = BoundRecord::new(&hit);
    let b = a.clone();
    assert!(a.same_record(&b));

    let other = Rc::new(RefCell::new(HitInfo::default()));
    assert!(!a.same_record(&BoundRecord::new(&other)));
}
