use std::time::Duration;

use checkin::{
    config::CheckInConfig,
    core::durable::DurableStore,
    location::{Authorization, FixedLocation, LocationError, LocationFix, LocationProvider, SharedLocation},
    runtime::handle::{RuntimeConfig, spawn_checkin_log},
    service::{CheckInError, CheckInPolicy, CheckInService},
    types::{Coordinates, UNKNOWN_LOCATION},
};

fn service<L: LocationProvider>(location: L) -> CheckInService<L> {
    let log = spawn_checkin_log(DurableStore::in_memory(), RuntimeConfig::default());
    CheckInService::new(log, location, CheckInPolicy::default())
}

fn office() -> LocationFix {
    LocationFix::new(Coordinates::new(31.23, 121.47)).with_place_name("Office")
}

#[tokio::test]
async fn check_in_records_fix_notes_and_photos() {
    let svc = service(FixedLocation::new(office()));

    let rec = svc
        .check_in(Some("met client".to_string()), vec![b"p1".to_vec(), b"p2".to_vec()])
        .await
        .expect("check in");

    assert_eq!(rec.latitude, 31.23);
    assert_eq!(rec.longitude, 121.47);
    assert_eq!(rec.display_location_name(), "Office");
    assert_eq!(rec.notes.as_deref(), Some("met client"));

    let detail = svc.detail(rec.id).await.expect("detail");
    assert_eq!(detail.record, rec);
    assert_eq!(detail.photos, vec![b"p1".to_vec(), b"p2".to_vec()]);

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn no_fix_means_location_unavailable_and_nothing_saved() {
    let svc = service(FixedLocation::unavailable());

    let err = svc.check_in(None, Vec::new()).await.unwrap_err();
    assert!(matches!(err, CheckInError::Location(LocationError::Unavailable)));
    assert!(svc.history().await.expect("history").is_empty());

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unresolved_place_name_falls_back_and_blank_notes_are_dropped() {
    let svc = service(FixedLocation::new(LocationFix::new(Coordinates::new(1.0, 2.0))));

    let rec = svc.check_in(Some("   ".to_string()), Vec::new()).await.expect("check in");
    assert_eq!(rec.location_name, None);
    assert_eq!(rec.display_location_name(), UNKNOWN_LOCATION);
    assert_eq!(rec.notes, None);
    assert_eq!(rec.photos, None);
    assert!(svc.detail(rec.id).await.expect("detail").photos.is_empty());

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn photo_cap_is_enforced_before_locating() {
    let svc = service(FixedLocation::unavailable());

    let photos = vec![vec![0u8; 4]; 10];
    let err = svc.check_in(None, photos).await.unwrap_err();
    assert!(matches!(err, CheckInError::TooManyPhotos { count: 10, max: 9 }));

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn remove_then_detail_is_not_found() {
    let svc = service(FixedLocation::new(office()));
    let rec = svc.check_in(None, Vec::new()).await.expect("check in");

    svc.remove(rec.id).await.expect("remove");
    assert!(svc.detail(rec.id).await.unwrap_err().is_not_found());
    assert!(svc.remove(rec.id).await.unwrap_err().is_not_found());

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shared_location_waits_for_the_platform_fix() {
    let location = SharedLocation::new(Duration::from_secs(2));
    location.set_authorization(Authorization::Authorized);

    let platform = location.clone();
    tokio::spawn(async move {
        platform.refresh_requested().await;
        platform.publish_fix(Coordinates::new(48.85, 2.35));
        platform.resolve_place_name("Louvre");
    });

    let svc = service(location.clone());
    let rec = svc.check_in(None, Vec::new()).await.expect("check in");
    assert_eq!(rec.latitude, 48.85);
    assert_eq!(rec.longitude, 2.35);
    assert_eq!(location.current().and_then(|f| f.place_name).as_deref(), Some("Louvre"));

    svc.log().shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shared_location_times_out_without_a_fix() {
    let location = SharedLocation::new(Duration::from_millis(20));
    assert_eq!(location.request_fix().await, Err(LocationError::Unavailable));
}

#[tokio::test]
async fn shared_location_reports_denied_access() {
    let location = SharedLocation::new(Duration::from_millis(20));
    location.publish_fix(Coordinates::new(0.0, 0.0));
    location.set_authorization(Authorization::Denied);
    assert_eq!(location.request_fix().await, Err(LocationError::PermissionDenied));
}

#[tokio::test]
async fn shared_location_subscription_sees_name_resolution() {
    let location = SharedLocation::new(Duration::from_millis(20));
    let mut rx = location.subscribe().expect("subscription");

    location.publish_fix(Coordinates::new(35.68, 139.76));
    rx.changed().await.expect("fix");
    assert_eq!(rx.borrow_and_update().as_ref().and_then(|f| f.place_name.clone()), None);

    location.resolve_place_name("Tokyo Station");
    rx.changed().await.expect("name");
    assert_eq!(
        rx.borrow_and_update().as_ref().and_then(|f| f.place_name.clone()).as_deref(),
        Some("Tokyo Station")
    );
}

#[tokio::test]
async fn config_starts_a_service_over_the_configured_database() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let mut config = CheckInConfig::default();
    config.database.path = tmp.path().join("visits.db");
    config.check_in.max_photos = 1;

    let svc = config.start_service(FixedLocation::new(office())).expect("start");
    let err = svc
        .check_in(None, vec![b"a".to_vec(), b"b".to_vec()])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckInError::TooManyPhotos { count: 2, max: 1 }));

    let rec = svc.check_in(Some("standup".to_string()), vec![b"a".to_vec()]).await.expect("check in");
    svc.log().shutdown().await.expect("shutdown");

    let reopened = config.open_store().expect("reopen");
    assert_eq!(reopened.list(), vec![rec]);
}

#[tokio::test]
async fn shared_location_uses_policy_timeout() {
    let policy = CheckInPolicy {
        fix_timeout_ms: 20,
        ..CheckInPolicy::default()
    };
    let location = SharedLocation::new(policy.fix_timeout());
    let log = spawn_checkin_log(DurableStore::in_memory(), RuntimeConfig::default());
    let svc = CheckInService::new(log, location, policy);

    let err = svc.check_in(None, Vec::new()).await.unwrap_err();
    assert!(matches!(err, CheckInError::Location(LocationError::Unavailable)));

    svc.log().shutdown().await.expect("shutdown");
}
