// crates/sync-engine/src/types.rs
//! Core sync types and data structures

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Payload field that carries the remote record identifier
pub const RECORD_ID_FIELD: &str = "id";

/// Unique queue item identifier
///
/// Generated as `<unix-millis>-<random suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generates a new item ID
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..12]))
    }

    /// Creates an item ID from a string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Returns the item ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of mutation applied to a remote table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Insert the payload as a new record
    Create,
    /// Patch the record named by the payload's id
    Update,
    /// Delete the record named by the payload's id
    Delete,
}

impl Action {
    /// Returns true if the payload must carry a record id
    pub fn requires_record_id(&self) -> bool {
        !matches!(self, Action::Create)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "insert" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(SyncError::InvalidMutation(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

/// A single pending mutation
///
/// Items are values: the queue replaces them wholesale and callers only
/// ever see copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    id: ItemId,
    target: String,
    action: Action,
    payload: Value,
    enqueued_at: DateTime<Utc>,
    attempts: u32,
}

impl QueueItem {
    /// Creates a new item with zero attempts
    ///
    /// `Update` and `Delete` payloads must carry a string or integer `id`.
    pub fn new(target: impl Into<String>, action: Action, payload: Value) -> SyncResult<Self> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(SyncError::InvalidMutation(
                "target table must not be empty".to_string(),
            ));
        }

        let item = Self {
            id: ItemId::generate(),
            target,
            action,
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
        };

        if action.requires_record_id() && item.record_id().is_none() {
            return Err(SyncError::InvalidMutation(format!(
                "{} on '{}' requires a string or integer '{}' field in the payload",
                action, item.target, RECORD_ID_FIELD
            )));
        }

        Ok(item)
    }

    /// Unique item ID
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Remote table the mutation applies to
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Mutation kind
    pub fn action(&self) -> Action {
        self.action
    }

    /// Raw payload as enqueued
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// When the item was enqueued
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Number of failed sync attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record identifier taken from the payload
    pub fn record_id(&self) -> Option<String> {
        match self.payload.get(RECORD_ID_FIELD)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Payload with the record id stripped, used as an update patch
    pub fn patch(&self) -> Value {
        match &self.payload {
            Value::Object(fields) => {
                let mut fields = fields.clone();
                fields.remove(RECORD_ID_FIELD);
                Value::Object(fields)
            }
            other => other.clone(),
        }
    }

    /// Returns a copy with one more failed attempt
    pub(crate) fn with_failed_attempt(&self) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            ..self.clone()
        }
    }
}

/// Why a sync request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Another drain pass is running
    AlreadySyncing,
    /// The network is offline
    Offline,
    /// Nothing is queued
    EmptyQueue,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadySyncing => write!(f, "a sync is already in progress"),
            SkipReason::Offline => write!(f, "the network is offline"),
            SkipReason::EmptyQueue => write!(f, "the queue is empty"),
        }
    }
}

/// Per-item results of one drain pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Number of items presented to the remote store
    pub attempted: usize,
    /// Items applied successfully and removed
    pub succeeded: Vec<ItemId>,
    /// Items that failed and stay queued
    pub retried: Vec<ItemId>,
    /// Items that failed and were given up on
    pub dropped: Vec<ItemId>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    /// Returns true if every attempted item succeeded
    pub fn is_clean(&self) -> bool {
        self.retried.is_empty() && self.dropped.is_empty()
    }
}

/// Result of a sync request
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The request was a no-op
    Skipped(SkipReason),
    /// A full drain pass ran
    Completed(DrainReport),
}

impl SyncOutcome {
    /// Returns the drain report if a pass ran
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Returns true if nothing was attempted
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// Snapshot of coordinator state for badges and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last known connectivity
    pub online: bool,
    /// Whether a drain pass is running
    pub syncing: bool,
    /// Number of queued mutations
    pub queue_size: usize,
    /// When the last drain pass finished
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Returns true if there are mutations waiting to sync
    pub fn has_pending_changes(&self) -> bool {
        self.queue_size > 0
    }
}
