//! Store trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventRecord;
use crate::notification::NotificationRecord;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached (connection, pool, I/O)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error type for lock acquisition
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another run holds the lock for this job
    #[error("job {job} is already locked")]
    AlreadyLocked { job: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read consistency for event log scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadConsistency {
    /// Read from the primary; sees every committed append
    #[default]
    Strong,

    /// May read from a replica that lags behind the primary
    Eventual,
}

/// Mutual-exclusion row for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub job_name: String,
    /// Worker that acquired the lock
    pub holder: String,
    /// Task running under the lock
    pub task: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(job_name: impl Into<String>, holder: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            holder: holder.into(),
            task: task.into(),
            acquired_at: Utc::now(),
        }
    }
}

/// Append-only log of domain events
///
/// Producers append; the pipeline reads unresolved events and flips their
/// `resolved` flag. Implementations must preserve insertion order.
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
    /// Append an event
    async fn append(&self, event: EventRecord) -> Result<(), StoreError>;

    /// All events with `resolved = false`, oldest append first
    async fn list_unresolved(
        &self,
        consistency: ReadConsistency,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Set `resolved = true` on the given events
    ///
    /// Returns the number of events that changed.
    async fn mark_resolved(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
}

/// Store of rendered notifications
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Insert rendered notifications
    ///
    /// A record whose `event_id` already has a notification is skipped.
    /// Returns the number of records actually inserted.
    async fn insert_batch(&self, records: Vec<NotificationRecord>) -> Result<u64, StoreError>;

    /// Delete notifications created strictly before `threshold`
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Notifications visible to `user`, oldest first
    async fn list_visible_to(&self, user: &str) -> Result<Vec<NotificationRecord>, StoreError>;
}

/// Job-level lock rows
#[async_trait]
pub trait LockStore: Send + Sync + 'static {
    /// Insert the lock row; fails with [`LockError::AlreadyLocked`] if one exists
    async fn acquire(&self, lock: LockRecord) -> Result<(), LockError>;

    /// Remove the lock row for `job_name` whether or not it exists
    async fn release(&self, job_name: &str) -> Result<(), StoreError>;

    /// Current lock row for `job_name`
    async fn get(&self, job_name: &str) -> Result<Option<LockRecord>, StoreError>;
}
