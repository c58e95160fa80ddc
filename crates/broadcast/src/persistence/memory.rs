//! In-memory implementation of the broadcast stores

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::event::EventRecord;
use crate::notification::NotificationRecord;

/// In-memory implementation of [`EventLog`], [`NotificationStore`] and [`LockStore`]
///
/// Intended for tests and single-process deployments. It provides the same
/// semantics as the PostgreSQL implementation: insertion-ordered scans,
/// one notification per event and unique lock rows.
///
/// # Example
///
/// ```
/// use bourse_broadcast::InMemoryBroadcastStore;
///
/// let store = InMemoryBroadcastStore::new();
/// assert_eq!(store.event_count(), 0);
/// ```
pub struct InMemoryBroadcastStore {
    events: RwLock<Vec<EventRecord>>,
    notifications: RwLock<Vec<NotificationRecord>>,
    locks: RwLock<HashMap<String, LockRecord>>,
}

impl InMemoryBroadcastStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            notifications: RwLock::new(Vec::new()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of events in the log
    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    /// Get the number of unresolved events
    pub fn unresolved_count(&self) -> usize {
        self.events.read().iter().filter(|e| !e.resolved).count()
    }

    /// Look up an event by id
    pub fn event(&self, id: Uuid) -> Option<EventRecord> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of all notifications in insertion order
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.notifications.read().clone()
    }

    /// Insert a notification directly, bypassing the pipeline
    pub fn seed_notification(&self, record: NotificationRecord) {
        self.notifications.write().push(record);
    }
}

impl Default for InMemoryBroadcastStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryBroadcastStore {
    async fn append(&self, event: EventRecord) -> Result<(), StoreError> {
        let mut events = self.events.write();
        if events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::Database(format!(
                "duplicate event id: {}",
                event.id
            )));
        }
        events.push(event);
        Ok(())
    }

    async fn list_unresolved(
        &self,
        _consistency: ReadConsistency,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| !e.resolved)
            .cloned()
            .collect())
    }

    async fn mark_resolved(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut events = self.events.write();
        let mut changed = 0;

        for event in events.iter_mut() {
            if !event.resolved && ids.contains(&event.id) {
                event.resolved = true;
                changed += 1;
            }
        }

        Ok(changed)
    }
}

#[async_trait]
impl NotificationStore for InMemoryBroadcastStore {
    async fn insert_batch(&self, records: Vec<NotificationRecord>) -> Result<u64, StoreError> {
        let mut notifications = self.notifications.write();
        let mut seen: HashSet<Uuid> = notifications.iter().map(|n| n.event_id).collect();
        let mut inserted = 0;

        for record in records {
            if seen.insert(record.event_id) {
                notifications.push(record);
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut notifications = self.notifications.write();
        let before = notifications.len();
        notifications.retain(|n| n.created_at >= threshold);
        Ok((before - notifications.len()) as u64)
    }

    async fn list_visible_to(&self, user: &str) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut visible: Vec<NotificationRecord> = self
            .notifications
            .read()
            .iter()
            .filter(|n| n.visibility.is_visible_to(user))
            .cloned()
            .collect();
        visible.sort_by_key(|n| n.created_at);
        Ok(visible)
    }
}

#[async_trait]
impl LockStore for InMemoryBroadcastStore {
    async fn acquire(&self, lock: LockRecord) -> Result<(), LockError> {
        match self.locks.write().entry(lock.job_name.clone()) {
            Entry::Occupied(_) => Err(LockError::AlreadyLocked { job: lock.job_name }),
            Entry::Vacant(slot) => {
                slot.insert(lock);
                Ok(())
            }
        }
    }

    async fn release(&self, job_name: &str) -> Result<(), StoreError> {
        self.locks.write().remove(job_name);
        Ok(())
    }

    async fn get(&self, job_name: &str) -> Result<Option<LockRecord>, StoreError> {
        Ok(self.locks.read().get(job_name).cloned())
    }
}
