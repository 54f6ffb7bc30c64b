//! Append-only store of run records.
//!
//! Records are keyed by `run_id` (candidate identity + input identity).
//! Several records may share a `run_id`; none is ever overwritten, merged or
//! mutated. [`JsonResultStore`] keeps everything in memory and, when
//! persistence is enabled, rewrites a single JSON file after every append
//! before the append returns.

use crate::cost::Cost;
use crate::error::StorageError;
use crate::implementation::{Implementation, RunOutcome};
use crate::persistence;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default file name for the on-disk store.
pub const DEFAULT_STORE_FILE: &str = "undetermini-db.json";

const STORE_FORMAT_VERSION: u32 = 1;

/// One persisted execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub implementation_id: String,
    pub input_id: String,
    pub input: Value,
    /// `None` when the run failed; `Some(Value::Null)` when it returned null.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub latency_ms: u64,
    pub cost: Cost,
    /// Older store files may lack the timestamp; such records load as fresh.
    #[serde(default = "Utc::now")]
    pub runned_at: DateTime<Utc>,
}

/// A present `result` key always deserializes to `Some`, even when null.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl RunRecord {
    /// Record the outcome of running `implementation` against `input`, stamped
    /// with the current time.
    pub fn from_outcome(implementation: &Implementation, input: &Value, outcome: RunOutcome) -> Self {
        Self {
            run_id: implementation.run_identity(input),
            implementation_id: implementation.implementation_identity(),
            input_id: Implementation::input_identity(input),
            input: input.clone(),
            result: outcome.result,
            error: outcome.error.map(|e| e.message().to_string()),
            latency_ms: outcome.latency_ms,
            cost: outcome.cost,
            runned_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Query and append interface the engine relies on.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append one record. Durable stores must have flushed it before returning.
    async fn add_run_result(&self, record: RunRecord) -> Result<(), StorageError>;

    /// Number of records stored under `run_id`.
    async fn count_run_results(&self, run_id: &str) -> Result<usize, StorageError>;

    /// The `limit` most recent records for `run_id`, newest first.
    async fn get_last_run_results(
        &self,
        run_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StorageError>;

    /// All records for `run_id`, oldest first.
    async fn get_run_results(&self, run_id: &str) -> Result<Vec<RunRecord>, StorageError>;
}

/// How a [`JsonResultStore`] keeps its records.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub persist_on_disk: bool,
    /// File to persist to; [`DEFAULT_STORE_FILE`] when unset.
    pub path: Option<PathBuf>,
}

impl StoreOptions {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            persist_on_disk: true,
            path: Some(path.into()),
        }
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    records: &'a [RunRecord],
}

#[derive(Deserialize)]
struct StoreFile {
    #[allow(dead_code)]
    version: u32,
    records: Vec<RunRecord>,
}

/// In-memory record collection, optionally mirrored to one JSON file.
#[derive(Debug)]
pub struct JsonResultStore {
    records: Mutex<Vec<RunRecord>>,
    path: Option<PathBuf>,
}

impl JsonResultStore {
    /// Open a store. With persistence enabled the existing file is loaded
    /// first, or an empty one is written if none exists yet. In-memory mode
    /// never touches disk.
    pub async fn create(options: StoreOptions) -> Result<Self, StorageError> {
        if !options.persist_on_disk {
            return Ok(Self::in_memory());
        }

        let path = options
            .path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE));
        let records = match persistence::load_json::<StoreFile>(&path).await {
            Ok(Some(file)) => file.records,
            Ok(None) => {
                persistence::atomic_write_json(
                    &path,
                    &StoreFileRef {
                        version: STORE_FORMAT_VERSION,
                        records: &[],
                    },
                )
                .await
                .map_err(|e| StorageError::Write {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Vec::new()
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(StorageError::Corrupt {
                    path,
                    message: e.to_string(),
                });
            }
            Err(e) => {
                return Err(StorageError::Load {
                    path,
                    message: e.to_string(),
                });
            }
        };

        info!(
            path = %path.display(),
            records = records.len(),
            "Opened result store"
        );
        Ok(Self {
            records: Mutex::new(records),
            path: Some(path),
        })
    }

    /// A store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Snapshot of every record, in insertion order.
    pub async fn all(&self) -> Vec<RunRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ResultStore for JsonResultStore {
    async fn add_run_result(&self, record: RunRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        let run_id = record.run_id.clone();
        records.push(record);

        if let Some(path) = &self.path {
            let snapshot = StoreFileRef {
                version: STORE_FORMAT_VERSION,
                records: records.as_slice(),
            };
            let written = persistence::atomic_write_json(path, &snapshot).await;
            if let Err(e) = written {
                // Keep memory and disk in agreement: the record was not stored.
                records.pop();
                return Err(StorageError::Write {
                    path: path.clone(),
                    message: e.to_string(),
                });
            }
        }

        debug!(run_id = run_id.as_str(), total = records.len(), "Stored run record");
        Ok(())
    }

    async fn count_run_results(&self, run_id: &str) -> Result<usize, StorageError> {
        let records = self.records.lock().await;
        Ok(records.iter().filter(|r| r.run_id == run_id).count())
    }

    async fn get_last_run_results(
        &self,
        run_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StorageError> {
        let records = self.records.lock().await;
        let mut matching: Vec<(usize, &RunRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.run_id == run_id)
            .collect();
        // Newest first; later insertions win timestamp ties.
        matching.sort_by(|(ia, a), (ib, b)| b.runned_at.cmp(&a.runned_at).then(ib.cmp(ia)));
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn get_run_results(&self, run_id: &str) -> Result<Vec<RunRecord>, StorageError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(run_id: &str, cost: f64, runned_at: DateTime<Utc>) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            implementation_id: "impl".into(),
            input_id: "input".into(),
            input: json!({"pdfAsText": "Nicolas Rotier"}),
            result: Some(json!({"firstname": "Nicolas"})),
            error: None,
            latency_ms: 12,
            cost: Cost::from_f64(cost),
            runned_at,
        }
    }

    #[tokio::test]
    async fn test_in_memory_add_and_count() {
        let store = JsonResultStore::create(StoreOptions::in_memory()).await.unwrap();
        let now = Utc::now();
        store.add_run_result(record("a", 1.0, now)).await.unwrap();
        store.add_run_result(record("a", 2.0, now)).await.unwrap();
        store.add_run_result(record("b", 3.0, now)).await.unwrap();

        assert_eq!(store.count_run_results("a").await.unwrap(), 2);
        assert_eq!(store.count_run_results("b").await.unwrap(), 1);
        assert_eq!(store.count_run_results("c").await.unwrap(), 0);
        assert_eq!(store.len().await, 3);
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_last_results_newest_first_with_limit() {
        let store = JsonResultStore::in_memory();
        let base = Utc::now();
        store.add_run_result(record("a", 2.0, base + Duration::seconds(2))).await.unwrap();
        store.add_run_result(record("a", 1.0, base)).await.unwrap();
        store.add_run_result(record("a", 3.0, base + Duration::seconds(3))).await.unwrap();
        store.add_run_result(record("b", 9.0, base + Duration::seconds(9))).await.unwrap();

        let last = store.get_last_run_results("a", 2).await.unwrap();
        let costs: Vec<String> = last.iter().map(|r| r.cost.to_string()).collect();
        assert_eq!(costs, vec!["3", "2"]);

        let all = store.get_last_run_results("a", 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_timestamp_ties_prefer_latest_insert() {
        let store = JsonResultStore::in_memory();
        let now = Utc::now();
        store.add_run_result(record("a", 1.0, now)).await.unwrap();
        store.add_run_result(record("a", 2.0, now)).await.unwrap();

        let last = store.get_last_run_results("a", 1).await.unwrap();
        assert_eq!(last[0].cost, Cost::from_f64(2.0));
    }

    #[tokio::test]
    async fn test_get_run_results_oldest_first() {
        let store = JsonResultStore::in_memory();
        let now = Utc::now();
        store.add_run_result(record("a", 1.0, now)).await.unwrap();
        store.add_run_result(record("a", 2.0, now)).await.unwrap();
        let results = store.get_run_results("a").await.unwrap();
        assert_eq!(results[0].cost, Cost::from_f64(1.0));
        assert_eq!(results[1].cost, Cost::from_f64(2.0));
    }

    #[tokio::test]
    async fn test_persistent_store_creates_file_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("undetermini-db.json");

        let store = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        assert!(path.exists());
        let rec = record("a", 0.00015, Utc::now());
        store.add_run_result(rec.clone()).await.unwrap();
        drop(store);

        let reopened = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        assert_eq!(reopened.count_run_results("a").await.unwrap(), 1);
        assert_eq!(reopened.get_run_results("a").await.unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn test_error_record_roundtrips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        let mut failed = record("a", 0.5, Utc::now());
        failed.result = None;
        failed.error = Some("Oops".into());
        store.add_run_result(failed).await.unwrap();

        let reopened = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        let loaded = reopened.get_run_results("a").await.unwrap();
        assert!(loaded[0].is_error());
        assert_eq!(loaded[0].error.as_deref(), Some("Oops"));
        assert!(loaded[0].result.is_none());
    }

    #[tokio::test]
    async fn test_null_result_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        let mut rec = record("a", 0.5, Utc::now());
        rec.result = Some(Value::Null);
        store.add_run_result(rec).await.unwrap();

        let reopened = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        let loaded = reopened.get_run_results("a").await.unwrap();
        assert_eq!(loaded[0].result, Some(Value::Null));
        assert!(!loaded[0].is_error());
    }

    #[tokio::test]
    async fn test_record_without_timestamp_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let file = json!({
            "version": 1,
            "records": [{
                "run_id": "a",
                "implementation_id": "impl",
                "input_id": "input",
                "input": {"pdfAsText": "Nicolas Rotier"},
                "result": {"firstname": "Nicolas"},
                "latency_ms": 12,
                "cost": "0.25"
            }]
        });
        std::fs::write(&path, file.to_string()).unwrap();

        let before = Utc::now();
        let store = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        let loaded = store.get_run_results("a").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].cost, Cost::from_f64(0.25));
        assert!(loaded[0].error.is_none());
        assert!(loaded[0].runned_at >= before);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "not json").unwrap();
        let err = JsonResultStore::create(StoreOptions::on_disk(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonResultStore::create(StoreOptions::on_disk(&path)).await.unwrap();
        store.add_run_result(record("a", 1.0, Utc::now())).await.unwrap();

        // A directory squatting on the temp file name makes the next write fail.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();
        let err = store
            .add_run_result(record("a", 2.0, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert_eq!(store.count_run_results("a").await.unwrap(), 1);

        std::fs::remove_dir(path.with_extension("tmp")).unwrap();
        store.add_run_result(record("a", 3.0, Utc::now())).await.unwrap();
        assert_eq!(store.count_run_results("a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_never_touches_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonResultStore::create(StoreOptions {
            persist_on_disk: false,
            path: Some(path.clone()),
        })
        .await
        .unwrap();
        store.add_run_result(record("a", 1.0, Utc::now())).await.unwrap();
        assert!(!path.exists());
    }
}
