//! One pass of the instant-message pipeline
//!
//! ```text
//! Idle → Locking → Scanning → Rendering → Committing → Releasing → Idle
//!                     │           │            │
//!                     └───────────┴────────────┴──→ Releasing (error re-raised)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{BroadcastConfig, TASK_NAME};
use crate::lock::JobLock;
use crate::notification::{render, NotificationRecord, RenderOutcome, SuppressReason};
use crate::persistence::{EventLog, LockStore, NotificationStore, ReadConsistency, StoreError};

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Store error during scan, commit or expiry
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The run body panicked; the lock was released before reporting
    #[error("pipeline run panicked: {0}")]
    Panicked(String),

    /// The run finished but its lock row could not be removed
    #[error("failed to release lock: {0}")]
    Release(StoreError),
}

/// Counters for one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unresolved events read from the log
    pub scanned: usize,
    /// Notifications rendered
    pub produced: usize,
    /// Notifications the store accepted (duplicates are skipped)
    pub inserted: u64,
    /// Events of excluded kinds
    pub suppressed: usize,
    /// Events whose payload lacked a required field
    pub malformed: usize,
    /// Events of unknown kinds
    pub unrecognized: usize,
    /// Events whose resolved flag changed
    pub resolved: u64,
    /// Marking events resolved failed after notifications were written
    pub resolve_failed: bool,
    /// Expired notifications deleted
    pub expired: u64,
}

impl RunReport {
    /// Whether the run found nothing to do
    pub fn is_idle(&self) -> bool {
        self.scanned == 0 && self.expired == 0
    }
}

/// Outcome of a pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run held the lock and finished
    Completed(RunReport),

    /// Another run held the lock; nothing was touched
    Skipped,
}

/// Renders unresolved events into notifications under a job lock
pub struct BroadcastPipeline {
    events: Arc<dyn EventLog>,
    notifications: Arc<dyn NotificationStore>,
    lock: JobLock,
    retention: chrono::Duration,
}

impl BroadcastPipeline {
    /// Create a pipeline over separate stores
    pub fn new(
        events: Arc<dyn EventLog>,
        notifications: Arc<dyn NotificationStore>,
        locks: Arc<dyn LockStore>,
        config: &BroadcastConfig,
    ) -> Self {
        Self {
            events,
            notifications,
            lock: JobLock::new(locks, &config.job_name, &config.worker_id, TASK_NAME),
            retention: config.retention_window(),
        }
    }

    /// Create a pipeline over a single store implementing all three roles
    pub fn from_store<S>(store: Arc<S>, config: &BroadcastConfig) -> Self
    where
        S: EventLog + NotificationStore + LockStore,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn job_name(&self) -> &str {
        self.lock.job_name()
    }

    /// Run one pass against the current time
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Run one pass, expiring notifications relative to `now`
    #[instrument(skip(self), fields(job = %self.lock.job_name(), holder = %self.lock.holder()))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        match self.lock.run(self.process(now)).await? {
            Some(report) => Ok(RunOutcome::Completed(report)),
            None => Ok(RunOutcome::Skipped),
        }
    }

    async fn process(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        let events = self.events.list_unresolved(ReadConsistency::Strong).await?;
        report.scanned = events.len();

        let mut batch: Vec<NotificationRecord> = Vec::new();
        let mut resolved_ids: Vec<Uuid> = Vec::with_capacity(events.len());

        for event in &events {
            resolved_ids.push(event.id);

            match render(event) {
                RenderOutcome::Produce(record) => batch.push(record),
                RenderOutcome::Suppress(SuppressReason::Excluded) => report.suppressed += 1,
                RenderOutcome::Suppress(SuppressReason::MalformedPayload(field)) => {
                    warn!(
                        event_id = %event.id,
                        kind = %event.kind,
                        %field,
                        "Event payload is malformed, resolving without notification"
                    );
                    report.malformed += 1;
                }
                RenderOutcome::Unrecognized(kind) => {
                    debug!(event_id = %event.id, %kind, "Unrecognized event kind");
                    report.unrecognized += 1;
                }
            }
        }
        report.produced = batch.len();

        if !batch.is_empty() {
            report.inserted = self.notifications.insert_batch(batch).await?;
        }

        if !resolved_ids.is_empty() {
            match self.events.mark_resolved(&resolved_ids).await {
                Ok(changed) => report.resolved = changed,
                Err(e) if report.produced > 0 => {
                    // Notifications are already written; the events will be
                    // rescanned and the store skips their duplicates.
                    warn!(error = %e, count = resolved_ids.len(), "Failed to mark events resolved");
                    report.resolve_failed = true;
                }
                Err(e) => return Err(e.into()),
            }
        }

        report.expired = self
            .notifications
            .delete_older_than(now - self.retention)
            .await?;

        if report.is_idle() {
            debug!("Instant message run found no work");
        } else {
            info!(
                scanned = report.scanned,
                inserted = report.inserted,
                suppressed = report.suppressed,
                malformed = report.malformed,
                unrecognized = report.unrecognized,
                expired = report.expired,
                "Instant message run completed"
            );
        }

        Ok(report)
    }
}
