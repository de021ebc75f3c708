use std::fs;

use foodbridge_impact::store::{LoadReport, DONATIONS_FILE, REQUESTS_FILE};
use foodbridge_impact::{
    ChangeNotifier, FixedClock, FoodType, JsonFileStore, LocalNotifier, NamedValue,
    RecomputeController, RecordStore, Status, StorageWatcher, StoreError,
};
use chrono::{TimeZone, Utc};

const DONATIONS: &str = r#"[
  {"id":"d3","donorName":"Green Deli","donorEmail":"deli@example.com","createdAt":1741161600000,
   "details":{"name":"Biryani","type":"cooked","quantity":"30 plates","packed":"packed","expiry":"6 hours"},
   "location":{"address":"MG Road","lat":12.97,"lng":77.59},"status":"Pending"},
  {"id":"d2","donor_name":"City Events","created_at":"2025-03-04T09:00:00Z",
   "details":{"type":"raw","quantity":"10,5 kg","packed":"unpacked"},"status":"Approved"},
  {"id":"d1","donorName":"Broken","details":{"quantity":"4"}},
  "not even an object"
]"#;

const REQUESTS: &str = r#"[
  {"id":"r1","orgName":"Night Shelter","requesterEmail":"a@example.com","createdAt":1741161600000,
   "details":{"type":"Cooked","quantity":"50","urgency":"today"},"status":"Pending"},
  {"id":"r2","requester_email":"b@example.com","created_at":1741161600000,
   "details":{"type":"Raw","quantity":"5 kg","urgency":"week"}}
]"#;

fn seeded() -> (tempfile::TempDir, JsonFileStore) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(DONATIONS_FILE), DONATIONS).unwrap();
    fs::write(dir.path().join(REQUESTS_FILE), REQUESTS).unwrap();
    let store = JsonFileStore::new(dir.path());
    (dir, store)
}

#[test]
fn loads_both_client_and_api_row_shapes() {
    let (_dir, store) = seeded();
    let (donations, report) = store.load_donations();
    assert_eq!(
        report,
        LoadReport {
            total_rows: 4,
            loaded_rows: 2,
            parse_errors: 2
        }
    );
    assert_eq!(donations[0].details.food_type, Some(FoodType::Cooked));
    assert_eq!(donations[1].donor_name.as_deref(), Some("City Events"));
    assert_eq!(donations[1].status, Status::Approved);

    let requests = store.list_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].requester_email.as_deref(), Some("b@example.com"));
}

#[test]
fn corrupt_or_missing_files_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(DONATIONS_FILE), "{ this is not json").unwrap();
    let store = JsonFileStore::new(dir.path());
    assert!(store.list_donations().is_empty());
    assert!(store.list_requests().is_empty());
}

#[test]
fn status_updates_keep_unmodelled_fields() {
    let (dir, store) = seeded();
    store.set_donation_status("d3", Status::Picked).unwrap();
    let err = store.set_donation_status("d3", Status::Approved).unwrap_err();
    assert!(matches!(err, StoreError::StatusRegression { .. }));
    assert!(matches!(
        store.set_request_status("nope", Status::Approved),
        Err(StoreError::NotFound(_))
    ));

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(DONATIONS_FILE)).unwrap()).unwrap();
    assert_eq!(raw[0]["status"], "Picked");
    assert_eq!(raw[0]["location"]["address"], "MG Road");
}

#[test]
fn appended_records_come_first_and_round_trip() {
    let (_dir, store) = seeded();
    let mut fresh = store.list_donations()[1].clone();
    fresh.id = "d4".to_string();
    fresh.status = Status::Pending;
    store.append_donation(&fresh).unwrap();

    let donations = store.list_donations();
    assert_eq!(donations.len(), 3);
    assert_eq!(donations[0], fresh);
}

#[test]
fn watcher_drives_controller_after_external_write() {
    let (dir, store) = seeded();
    let notifier = LocalNotifier::new();
    let mut watcher = StorageWatcher::new(store.watched_paths());
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap());
    let controller = RecomputeController::new(store.clone(), notifier.clone(), clock);

    assert_eq!(
        controller.monthly_leaderboard(2025, 3),
        vec![NamedValue::new("deli@example.com", 30), NamedValue::new("City Events", 10)]
    );

    // Another process truncates the donation log.
    fs::write(dir.path().join(DONATIONS_FILE), "[]").unwrap();
    assert!(watcher.poll(&notifier));
    assert!(controller.monthly_leaderboard(2025, 3).is_empty());
    assert_eq!(controller.stats().organizations_helped, 2);

    notifier.publish(foodbridge_impact::ChangeSignal::DataChanged);
    assert_eq!(controller.version(), 2);
}
