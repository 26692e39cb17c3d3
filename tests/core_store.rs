use chrono::{DateTime, Duration, TimeZone, Utc};

use checkin::{
    checkin::{CheckInDraft, CheckInPatch},
    core::store::{CheckInStore, StoreError},
    op::Op,
    photo::PhotoBlob,
    types::UNKNOWN_LOCATION,
};

fn t(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 18, 9, minute, 0).unwrap()
}

fn draft(ts: DateTime<Utc>) -> CheckInDraft {
    CheckInDraft::new(ts, 31.23, 121.47)
}

fn listed_ids(store: &CheckInStore) -> Vec<u64> {
    store.list().into_iter().map(|r| r.id).collect()
}

#[test]
fn create_yields_monotonic_ids_and_seqs() {
    let mut store = CheckInStore::new();
    let (r1, op1) = store.create(draft(t(1))).unwrap();
    let (r2, op2) = store.create(draft(t(2))).unwrap();
    let (r3, op3) = store.create(draft(t(3))).unwrap();

    assert_eq!((r1.id, r2.id, r3.id), (1, 2, 3));
    assert_eq!((op1.seq, op2.seq, op3.seq), (1, 2, 3));
}

#[test]
fn list_is_newest_timestamp_first() {
    let mut store = CheckInStore::new();
    // created out of timestamp order on purpose
    let (mid, _) = store.create(draft(t(20))).unwrap();
    let (old, _) = store.create(draft(t(10))).unwrap();
    let (new, _) = store.create(draft(t(30))).unwrap();

    assert_eq!(listed_ids(&store), vec![new.id, mid.id, old.id]);
}

#[test]
fn equal_timestamps_list_most_recently_created_first() {
    let mut store = CheckInStore::new();
    let (a, _) = store.create(draft(t(5))).unwrap();
    let (b, _) = store.create(draft(t(5))).unwrap();
    let (c, _) = store.create(draft(t(5))).unwrap();

    assert_eq!(listed_ids(&store), vec![c.id, b.id, a.id]);
}

#[test]
fn get_reads_back_what_create_returned() {
    let mut store = CheckInStore::new();
    let photos = PhotoBlob::encode(&[b"b1".to_vec(), b"b2".to_vec()]).unwrap();
    let (rec, _) = store
        .create(
            draft(t(0))
                .with_location_name("Office")
                .with_notes("met client")
                .with_photos(photos.clone()),
        )
        .unwrap();

    assert_eq!(store.get(rec.id), Some(&rec));
    assert_eq!(rec.location_name.as_deref(), Some("Office"));
    assert_eq!(rec.notes.as_deref(), Some("met client"));
    assert_eq!(rec.photos, Some(photos));
    assert!(listed_ids(&store).contains(&rec.id));
}

#[test]
fn timestamps_are_kept_at_microsecond_precision() {
    let mut store = CheckInStore::new();
    let ts = t(0) + Duration::nanoseconds(1_234_567);
    let (rec, _) = store.create(draft(ts)).unwrap();
    assert_eq!(rec.timestamp, t(0) + Duration::microseconds(1_234));
}

#[test]
fn delete_twice_reports_not_found_and_leaves_state_unchanged() {
    let mut store = CheckInStore::new();
    let (keep, _) = store.create(draft(t(1))).unwrap();
    let (gone, _) = store.create(draft(t(2))).unwrap();

    store.delete(gone.id).unwrap();
    let after_first = store.export_snapshot();

    assert_eq!(store.delete(gone.id).unwrap_err(), StoreError::NotFound(gone.id));
    assert_eq!(store.export_snapshot(), after_first);
    assert_eq!(listed_ids(&store), vec![keep.id]);
    assert!(store.get(gone.id).is_none());
}

#[test]
fn deleted_ids_are_never_reissued() {
    let mut store = CheckInStore::new();
    let (a, _) = store.create(draft(t(1))).unwrap();
    store.delete(a.id).unwrap();
    let (b, _) = store.create(draft(t(2))).unwrap();
    assert!(b.id > a.id);
}

#[test]
fn out_of_range_coordinates_are_rejected_without_consuming_an_id() {
    let mut store = CheckInStore::new();
    for (lat, lon) in [(91.0, 0.0), (-90.5, 0.0), (0.0, 180.5), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
        let err = store.create(CheckInDraft::new(t(0), lat, lon)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCoordinates { .. }));
    }
    assert!(store.is_empty());

    let (edge, _) = store.create(CheckInDraft::new(t(0), -90.0, 180.0)).unwrap();
    assert_eq!(edge.id, 1);
}

#[test]
fn empty_photo_set_is_distinct_from_absent_photos() {
    let mut store = CheckInStore::new();
    let (none, _) = store.create(draft(t(1))).unwrap();
    let (empty, _) = store
        .create(draft(t(2)).with_photos(PhotoBlob::encode::<Vec<u8>>(&[]).unwrap()))
        .unwrap();

    assert_eq!(none.photos, None);
    assert_eq!(empty.photos.as_ref().map(|p| p.bytes.clone()), Some(vec![0, 0, 0, 0]));
    assert!(none.decode_photos().unwrap().is_empty());
    assert!(empty.decode_photos().unwrap().is_empty());
}

#[test]
fn missing_place_name_displays_sentinel() {
    let mut store = CheckInStore::new();
    let (rec, _) = store.create(draft(t(1))).unwrap();
    assert_eq!(rec.display_location_name(), UNKNOWN_LOCATION);
}

#[test]
fn update_patches_only_mutable_fields_and_revert_restores() {
    let mut store = CheckInStore::new();
    let (before, _) = store.create(draft(t(1)).with_notes("draft")).unwrap();

    let (after, stored) = store
        .update(
            before.id,
            CheckInPatch {
                notes: Some(Some("final".to_string())),
                location_name: Some(Some("Lobby".to_string())),
                ..CheckInPatch::default()
            },
        )
        .unwrap();

    assert_eq!(after.notes.as_deref(), Some("final"));
    assert_eq!(after.location_name.as_deref(), Some("Lobby"));
    assert_eq!(after.timestamp, before.timestamp);
    assert_eq!(after.latitude, before.latitude);
    assert!(matches!(stored.op, Op::Update { .. }));

    store.revert(&stored).unwrap();
    assert_eq!(store.get(before.id), Some(&before));
}

#[test]
fn update_of_missing_record_is_not_found() {
    let mut store = CheckInStore::new();
    let err = store.update(7, CheckInPatch::default()).unwrap_err();
    assert_eq!(err, StoreError::NotFound(7));
}

#[test]
fn revert_of_create_and_delete_restores_listing() {
    let mut store = CheckInStore::new();
    let (a, _) = store.create(draft(t(1))).unwrap();
    let (b, create_b) = store.create(draft(t(2))).unwrap();

    store.revert(&create_b).unwrap();
    assert_eq!(listed_ids(&store), vec![a.id]);

    let (_, delete_a) = store.delete(a.id).unwrap();
    store.revert(&delete_a).unwrap();
    assert_eq!(listed_ids(&store), vec![a.id]);

    // reverted create does not hand its id back
    let (c, _) = store.create(draft(t(3))).unwrap();
    assert!(c.id > b.id);
}

#[test]
fn recent_and_between_follow_list_order() {
    let mut store = CheckInStore::new();
    let ids: Vec<u64> = (0..6).map(|m| store.create(draft(t(m * 10))).unwrap().0.id).collect();

    let recent: Vec<u64> = store.recent(2).into_iter().map(|r| r.id).collect();
    assert_eq!(recent, vec![ids[5], ids[4]]);

    // [t(10), t(40)) holds minutes 10, 20, 30
    let window: Vec<u64> = store.between(t(10), t(40)).into_iter().map(|r| r.id).collect();
    assert_eq!(window, vec![ids[3], ids[2], ids[1]]);

    assert!(store.between(t(40), t(10)).is_empty());
    assert!(store.between(t(10), t(10)).is_empty());
}

#[test]
fn snapshot_round_trip_preserves_records_and_counters() {
    let mut store = CheckInStore::new();
    for m in 0..5 {
        store.create(draft(t(m)).with_notes(format!("visit {m}"))).unwrap();
    }
    store.delete(5).unwrap();

    let snapshot = store.export_snapshot();
    let restored = CheckInStore::from_snapshot(snapshot.clone()).unwrap();

    assert_eq!(restored.export_snapshot(), snapshot);
    assert_eq!(restored.next_record_id(), 6);
    assert_eq!(listed_ids(&restored), vec![4, 3, 2, 1]);
}
