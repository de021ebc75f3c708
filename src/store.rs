// Record store collaborators.
//
// The aggregators only ever see full snapshots handed out by a `RecordStore`.
// Reading never fails: missing files, corrupt JSON, and malformed rows all
// degrade to fewer (or zero) records. Only writes report errors.
use crate::types::{DonationRecord, RawDonation, RawRequest, RequestRecord, RowRejection, Status};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

pub const DONATIONS_FILE: &str = "donations.json";
pub const REQUESTS_FILE: &str = "requests.json";

/// Read side of the record store.
pub trait RecordStore {
    fn list_donations(&self) -> Vec<DonationRecord>;
    fn list_requests(&self) -> Vec<RequestRecord>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn list_donations(&self) -> Vec<DonationRecord> {
        (**self).list_donations()
    }

    fn list_requests(&self) -> Vec<RequestRecord> {
        (**self).list_requests()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("record file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no record with id '{0}'")]
    NotFound(String),
    #[error("record '{id}' cannot move from {from} back to {to}")]
    StatusRegression { id: String, from: Status, to: Status },
}

fn advance_status(id: &str, current: &mut Status, next: Status) -> Result<(), StoreError> {
    if !current.can_advance_to(next) {
        return Err(StoreError::StatusRegression {
            id: id.to_string(),
            from: *current,
            to: next,
        });
    }
    *current = next;
    Ok(())
}

/// Thread-safe in-memory store, used by tests and embedders that already hold
/// their records.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    donations: RwLock<Vec<DonationRecord>>,
    requests: RwLock<Vec<RequestRecord>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(donations: Vec<DonationRecord>, requests: Vec<RequestRecord>) -> Self {
        InMemoryStore {
            donations: RwLock::new(donations),
            requests: RwLock::new(requests),
        }
    }

    pub fn append_donation(&self, record: DonationRecord) {
        write(&self.donations).push(record);
    }

    pub fn append_request(&self, record: RequestRecord) {
        write(&self.requests).push(record);
    }

    pub fn set_donation_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let mut donations = write(&self.donations);
        let record = donations
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        advance_status(id, &mut record.status, status)
    }

    pub fn set_request_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let mut requests = write(&self.requests);
        let record = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        advance_status(id, &mut record.status, status)
    }
}

impl RecordStore for InMemoryStore {
    fn list_donations(&self) -> Vec<DonationRecord> {
        read(&self.donations).clone()
    }

    fn list_requests(&self) -> Vec<RequestRecord> {
        read(&self.requests).clone()
    }
}

/// Diagnostics from one read of a record file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
}

/// Directory holding `donations.json` and `requests.json`, each a JSON array
/// of records in the web client's format. Newest records come first.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn donations_path(&self) -> PathBuf {
        self.dir.join(DONATIONS_FILE)
    }

    pub fn requests_path(&self) -> PathBuf {
        self.dir.join(REQUESTS_FILE)
    }

    /// Files another process may mutate underneath us.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        vec![self.donations_path(), self.requests_path()]
    }

    pub fn load_donations(&self) -> (Vec<DonationRecord>, LoadReport) {
        load_rows::<RawDonation, DonationRecord>(&self.donations_path())
    }

    pub fn load_requests(&self) -> (Vec<RequestRecord>, LoadReport) {
        load_rows::<RawRequest, RequestRecord>(&self.requests_path())
    }

    pub fn append_donation(&self, record: &DonationRecord) -> Result<(), StoreError> {
        prepend_row(&self.donations_path(), record)
    }

    pub fn append_request(&self, record: &RequestRecord) -> Result<(), StoreError> {
        prepend_row(&self.requests_path(), record)
    }

    pub fn set_donation_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        update_status(&self.donations_path(), id, status)
    }

    pub fn set_request_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        update_status(&self.requests_path(), id, status)
    }
}

impl RecordStore for JsonFileStore {
    fn list_donations(&self) -> Vec<DonationRecord> {
        self.load_donations().0
    }

    fn list_requests(&self) -> Vec<RequestRecord> {
        self.load_requests().0
    }
}

fn load_rows<R, T>(path: &Path) -> (Vec<T>, LoadReport)
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = RowRejection>,
{
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} does not exist yet; treating as empty", path.display());
            return (Vec::new(), LoadReport::default());
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return (Vec::new(), LoadReport::default());
        }
    };
    if text.trim().is_empty() {
        return (Vec::new(), LoadReport::default());
    }
    let rows: Vec<Value> = match serde_json::from_str(&text) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Ignoring corrupt record file {}: {}", path.display(), e);
            return (Vec::new(), LoadReport::default());
        }
    };

    let total_rows = rows.len();
    let mut parse_errors = 0usize;
    let mut records = Vec::with_capacity(total_rows);
    for (idx, row) in rows.into_iter().enumerate() {
        let parsed = serde_json::from_value::<R>(row)
            .map_err(|e| e.to_string())
            .and_then(|raw| T::try_from(raw).map_err(|r| format!("{:?}", r)));
        match parsed {
            Ok(rec) => records.push(rec),
            Err(reason) => {
                parse_errors += 1;
                tracing::debug!("Skipping row {} of {}: {}", idx, path.display(), reason);
            }
        }
    }
    if parse_errors > 0 {
        tracing::warn!(
            "{} of {} rows in {} skipped due to parse errors",
            parse_errors,
            total_rows,
            path.display()
        );
    }
    let report = LoadReport {
        total_rows,
        loaded_rows: records.len(),
        parse_errors,
    };
    (records, report)
}

/// Raw rows are rewritten as-is so fields this crate does not model
/// (locations, images, phone numbers) survive a write.
fn read_raw_rows(path: &Path) -> Result<Vec<Value>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_raw_rows(path: &Path, rows: &[Value]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Readers in other processes must never see a half-written file.
    let staging = path.with_extension("json.tmp");
    let s = serde_json::to_string_pretty(rows)?;
    std::fs::write(&staging, s)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}

fn prepend_row<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let mut rows = read_raw_rows(path)?;
    rows.insert(0, serde_json::to_value(record)?);
    write_raw_rows(path, &rows)
}

fn update_status(path: &Path, id: &str, status: Status) -> Result<(), StoreError> {
    let mut rows = read_raw_rows(path)?;
    let row = rows
        .iter_mut()
        .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    let mut current = row
        .get("status")
        .and_then(Value::as_str)
        .map(Status::parse)
        .unwrap_or_default();
    advance_status(id, &mut current, status)?;
    if let Some(obj) = row.as_object_mut() {
        obj.insert("status".to_string(), Value::String(current.to_string()));
    }
    write_raw_rows(path, &rows)
}
