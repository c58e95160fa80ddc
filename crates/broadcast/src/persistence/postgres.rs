//! PostgreSQL implementation of the broadcast stores
//!
//! - Event log scans ordered by a `BIGSERIAL` append sequence
//! - One instant message per event, enforced by a unique `event_id`
//! - Job locks enforced by the `resource_locks` primary key

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::store::*;
use crate::event::{EventFields, EventKind, EventRecord};
use crate::notification::{NotificationRecord, Visibility};

/// PostgreSQL implementation of [`EventLog`], [`NotificationStore`] and [`LockStore`]
///
/// Strongly consistent reads always go to the primary pool. Eventually
/// consistent reads use the replica pool when one is configured.
///
/// # Example
///
/// ```ignore
/// use bourse_broadcast::PostgresBroadcastStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/bourse").await?;
/// let store = PostgresBroadcastStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresBroadcastStore {
    pool: PgPool,
    replica: Option<PgPool>,
}

impl PostgresBroadcastStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            replica: None,
        }
    }

    /// Route eventually consistent reads to a replica
    pub fn with_replica(mut self, replica: PgPool) -> Self {
        self.replica = Some(replica);
        self
    }

    /// Get a reference to the primary connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                StoreError::Database(e.to_string())
            })
    }

    fn read_pool(&self, consistency: ReadConsistency) -> &PgPool {
        match (consistency, &self.replica) {
            (ReadConsistency::Eventual, Some(replica)) => replica,
            _ => &self.pool,
        }
    }
}

/// Map a sqlx error, separating unreachable-store failures from query failures
fn store_error(context: &str, e: sqlx::Error) -> StoreError {
    error!("{}: {}", context, e);
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        _ => StoreError::Database(e.to_string()),
    }
}

/// Decode a stored payload. A payload that does not fit [`EventFields`] decodes
/// as empty, so the renderer suppresses the event as malformed and the scan
/// carries on.
fn decode_fields(event_id: Uuid, fields: serde_json::Value) -> EventFields {
    serde_json::from_value(fields).unwrap_or_else(|e| {
        warn!(%event_id, error = %e, "Event payload does not decode, treating it as empty");
        EventFields::default()
    })
}

fn event_from_row(row: &PgRow) -> EventRecord {
    let id: Uuid = row.get("id");
    let event_type: String = row.get("event_type");
    let fields: serde_json::Value = row.get("fields");

    EventRecord {
        id,
        kind: EventKind::parse(&event_type),
        fields: decode_fields(id, fields),
        resolved: row.get("resolved"),
        created_at: row.get("created_at"),
    }
}

fn notification_from_row(row: &PgRow) -> NotificationRecord {
    let event_type: String = row.get("event_type");
    let users: Vec<String> = row.get("only_for_users");

    NotificationRecord {
        id: row.get("id"),
        event_id: row.get("event_id"),
        kind: EventKind::parse(&event_type),
        message: row.get("message"),
        visibility: if users.is_empty() {
            Visibility::Broadcast
        } else {
            Visibility::Restricted(users)
        },
        source: row.get("source"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl EventLog for PostgresBroadcastStore {
    #[instrument(skip(self, event), fields(event_id = %event.id, kind = %event.kind))]
    async fn append(&self, event: EventRecord) -> Result<(), StoreError> {
        let fields = serde_json::to_value(&event.fields)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO event_log (id, event_type, fields, resolved, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id)
        .bind(event.kind.as_str())
        .bind(&fields)
        .bind(event.resolved)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to append event", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_unresolved(
        &self,
        consistency: ReadConsistency,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, fields, resolved, created_at
            FROM event_log
            WHERE resolved = FALSE
            ORDER BY seq
            "#,
        )
        .fetch_all(self.read_pool(consistency))
        .await
        .map_err(|e| store_error("Failed to list unresolved events", e))?;

        Ok(rows.iter().map(event_from_row).collect())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn mark_resolved(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE event_log
            SET resolved = TRUE
            WHERE id = ANY($1) AND resolved = FALSE
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to mark events resolved", e))?;

        debug!(changed = result.rows_affected(), "marked events resolved");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationStore for PostgresBroadcastStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert_batch(&self, records: Vec<NotificationRecord>) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin transaction", e))?;

        let mut inserted = 0;
        for record in &records {
            let result = sqlx::query(
                r#"
                INSERT INTO instant_messages
                    (id, event_id, event_type, message, only_for_users, source, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (event_id) DO NOTHING
                "#,
            )
            .bind(record.id)
            .bind(record.event_id)
            .bind(record.kind.as_str())
            .bind(&record.message)
            .bind(record.visibility.users())
            .bind(&record.source)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to insert instant message", e))?;

            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit instant messages", e))?;

        debug!(inserted, "inserted instant messages");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM instant_messages WHERE created_at < $1")
            .bind(threshold)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to expire instant messages", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn list_visible_to(&self, user: &str) -> Result<Vec<NotificationRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, event_type, message, only_for_users, source, created_at
            FROM instant_messages
            WHERE cardinality(only_for_users) = 0 OR $1 = ANY(only_for_users)
            ORDER BY created_at, id
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list instant messages", e))?;

        Ok(rows.iter().map(notification_from_row).collect())
    }
}

#[async_trait]
impl LockStore for PostgresBroadcastStore {
    #[instrument(skip(self, lock), fields(job = %lock.job_name, holder = %lock.holder))]
    async fn acquire(&self, lock: LockRecord) -> Result<(), LockError> {
        let result = sqlx::query(
            r#"
            INSERT INTO resource_locks (job_name, holder, task, acquired_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&lock.job_name)
        .bind(&lock.holder)
        .bind(&lock.task)
        .bind(lock.acquired_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("lock already held");
                Err(LockError::AlreadyLocked { job: lock.job_name })
            }
            Err(e) => Err(store_error("Failed to acquire lock", e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn release(&self, job_name: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM resource_locks WHERE job_name = $1")
            .bind(job_name)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to release lock", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, job_name: &str) -> Result<Option<LockRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT job_name, holder, task, acquired_at
            FROM resource_locks
            WHERE job_name = $1
            "#,
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to read lock", e))?;

        Ok(row.map(|row| LockRecord {
            job_name: row.get("job_name"),
            holder: row.get("holder"),
            task: row.get("task"),
            acquired_at: row.get("acquired_at"),
        }))
    }
}
