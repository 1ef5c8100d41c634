// crates/sync-engine/src/remote.rs
//! Remote data store interface

use async_trait::async_trait;
use marketsync_resilience::{ResilienceError, Retryable};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::types::RECORD_ID_FIELD;

/// Result type for remote store calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Broad class of a remote store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Transport failure, connection refused, DNS
    Network,
    /// The call did not finish in time
    Timeout,
    /// The server failed (5xx-equivalent)
    Server,
    /// Credentials rejected
    Unauthorized,
    /// The record was rejected as invalid
    Validation,
    /// The record does not exist
    NotFound,
    /// The record conflicts with existing data
    Conflict,
    /// Anything else
    Other,
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RemoteErrorKind::Network => "network",
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Server => "server",
            RemoteErrorKind::Unauthorized => "unauthorized",
            RemoteErrorKind::Validation => "validation",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Conflict => "conflict",
            RemoteErrorKind::Other => "remote",
        };
        write!(f, "{}", name)
    }
}

/// Error returned by a remote store call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
}

impl RemoteError {
    /// Creates a new remote error
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transport-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    /// Rejected record
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, message)
    }

    /// Returns the error kind
    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if retrying can never succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Unauthorized
                | RemoteErrorKind::Validation
                | RemoteErrorKind::NotFound
                | RemoteErrorKind::Conflict
        )
    }
}

impl Retryable for RemoteError {
    fn is_retryable(&self) -> bool {
        !self.is_permanent()
    }
}

impl From<ResilienceError> for RemoteError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Timeout(_) => Self::new(RemoteErrorKind::Timeout, err.to_string()),
        }
    }
}

/// Generic create/update/delete API keyed by table name
///
/// Implementations own their transport; the sync engine only relies on
/// this contract.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts a record, returning the stored representation
    async fn insert(&self, table: &str, record: &Value) -> RemoteResult<Value>;

    /// Patches the record with the given id
    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()>;

    /// Deletes the record with the given id
    async fn delete_by_id(&self, table: &str, id: &str) -> RemoteResult<()>;
}

/// A call observed by [`MemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `insert(table, record)`
    Insert { table: String, record: Value },
    /// `update_by_id(table, id, patch)`
    Update {
        table: String,
        id: String,
        patch: Value,
    },
    /// `delete_by_id(table, id)`
    Delete { table: String, id: String },
}

impl RemoteCall {
    /// Table the call targeted
    pub fn table(&self) -> &str {
        match self {
            RemoteCall::Insert { table, .. }
            | RemoteCall::Update { table, .. }
            | RemoteCall::Delete { table, .. } => table,
        }
    }
}

#[derive(Default)]
struct MemoryRemoteState {
    tables: HashMap<String, BTreeMap<String, Value>>,
    calls: Vec<RemoteCall>,
    fail_all: Option<RemoteErrorKind>,
    fail_tables: HashMap<String, RemoteErrorKind>,
    latency: Option<Duration>,
}

/// In-process remote store
///
/// Keeps tables in memory, records every call in order, and can be told to
/// fail or stall. Updates and deletes that match no record succeed, the way
/// filter-based REST backends behave.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryRemoteState>,
}

impl MemoryRemoteStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryRemoteState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every call fail with `kind` (or succeed again with `None`)
    pub fn fail_all(&self, kind: Option<RemoteErrorKind>) {
        self.state().fail_all = kind;
    }

    /// Makes calls against one table fail with `kind`
    pub fn fail_table(&self, table: impl Into<String>, kind: RemoteErrorKind) {
        self.state().fail_tables.insert(table.into(), kind);
    }

    /// Clears per-table failures
    pub fn heal_tables(&self) {
        self.state().fail_tables.clear();
    }

    /// Delays every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Calls observed so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Number of calls observed so far
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Returns a stored record
    pub fn record(&self, table: &str, id: &str) -> Option<Value> {
        self.state()
            .tables
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned()
    }

    /// Number of records in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.state().tables.get(table).map_or(0, |rows| rows.len())
    }

    /// Records the call and returns the configured latency and failure
    fn begin(&self, call: RemoteCall) -> (Option<Duration>, Option<RemoteErrorKind>) {
        let mut state = self.state();
        let failure = state
            .fail_all
            .or_else(|| state.fail_tables.get(call.table()).copied());
        state.calls.push(call);
        (state.latency, failure)
    }

    async fn enter(&self, call: RemoteCall) -> RemoteResult<()> {
        let (latency, failure) = self.begin(call);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(kind) => Err(RemoteError::new(kind, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn insert(&self, table: &str, record: &Value) -> RemoteResult<Value> {
        self.enter(RemoteCall::Insert {
            table: table.to_string(),
            record: record.clone(),
        })
        .await?;

        let mut row = match record {
            Value::Object(fields) => fields.clone(),
            _ => return Err(RemoteError::validation("record must be a JSON object")),
        };
        let id = match row.get(RECORD_ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                let generated = Uuid::new_v4().to_string();
                row.insert(RECORD_ID_FIELD.to_string(), Value::String(generated.clone()));
                generated
            }
        };

        let mut state = self.state();
        let rows = state.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(RemoteError::new(
                RemoteErrorKind::Conflict,
                format!("{} '{}' already exists", table, id),
            ));
        }
        let stored = Value::Object(row);
        rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()> {
        self.enter(RemoteCall::Update {
            table: table.to_string(),
            id: id.to_string(),
            patch: patch.clone(),
        })
        .await?;

        let mut state = self.state();
        if let Some(Value::Object(existing)) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
        {
            if let Value::Object(changes) = patch {
                for (field, value) in changes {
                    existing.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> RemoteResult<()> {
        self.enter(RemoteCall::Delete {
            table: table.to_string(),
            id: id.to_string(),
        })
        .await?;

        if let Some(rows) = self.state().tables.get_mut(table) {
            rows.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permanent_classification() {
        assert!(RemoteError::validation("bad").is_permanent());
        assert!(RemoteError::new(RemoteErrorKind::NotFound, "gone").is_permanent());
        assert!(!RemoteError::network("down").is_permanent());
        assert!(!RemoteError::new(RemoteErrorKind::Server, "500").is_permanent());
        assert!(RemoteError::network("down").is_retryable());
    }

    #[test]
    fn test_timeout_conversion() {
        let err: RemoteError = ResilienceError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err.kind(), RemoteErrorKind::Timeout);
        assert!(err.to_string().starts_with("timeout error"));
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryRemoteStore::new();

        let stored = store
            .insert("orders", &json!({"id": "42", "status": "open"}))
            .await
            .unwrap();
        assert_eq!(stored["status"], "open");

        store
            .update_by_id("orders", "42", &json!({"status": "cancelled"}))
            .await
            .unwrap();
        assert_eq!(store.record("orders", "42").unwrap()["status"], "cancelled");

        store.delete_by_id("orders", "42").await.unwrap();
        assert_eq!(store.row_count("orders"), 0);
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_generates_ids() {
        let store = MemoryRemoteStore::new();
        let stored = store.insert("wishlist", &json!({"product": "p1"})).await.unwrap();
        assert!(stored["id"].is_string());
        assert_eq!(store.row_count("wishlist"), 1);
    }

    #[tokio::test]
    async fn test_memory_store_duplicate_insert_conflicts() {
        let store = MemoryRemoteStore::new();
        store.insert("orders", &json!({"id": 1})).await.unwrap();
        let err = store.insert("orders", &json!({"id": 1})).await.unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_memory_store_injected_failures() {
        let store = MemoryRemoteStore::new();
        store.fail_table("orders", RemoteErrorKind::Server);

        let err = store.delete_by_id("orders", "1").await.unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::Server);
        assert!(store.delete_by_id("wishlist", "1").await.is_ok());

        store.fail_all(Some(RemoteErrorKind::Network));
        assert!(store.delete_by_id("wishlist", "1").await.is_err());
        assert_eq!(store.call_count(), 3);
    }
}
