//! # Instant-Message Broadcast Pipeline
//!
//! Renders unresolved game-economy events into short-lived notification
//! records for connected clients.
//!
//! ## Features
//!
//! - **Total renderer**: every event kind maps to produce, suppress or
//!   unrecognized; nothing in the event log can fail a run
//! - **Exactly-once resolution**: every scanned event is marked resolved,
//!   whether or not it produced a notification
//! - **Job lock**: a single lock row per job name keeps runs from overlapping
//!   across worker processes
//! - **Retention**: notifications older than the retention window are deleted
//!   on every run
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BroadcastScheduler                        │
//! │  (fixed interval, start/stop, failures never stop ticking)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BroadcastPipeline                         │
//! │  JobLock → scan → render → insert → resolve → expire        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        EventLog / NotificationStore / LockStore              │
//! │  (PostgreSQL: event_log, instant_messages, resource_locks)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bourse_broadcast::prelude::*;
//!
//! # tokio_test_block_on(async {
//! let store = Arc::new(InMemoryBroadcastStore::new());
//! store
//!     .append(EventRecord::new(
//!         EventKind::PayrollPaid,
//!         EventFields::new().with_price(1000),
//!     ))
//!     .await
//!     .unwrap();
//!
//! let pipeline = BroadcastPipeline::from_store(store.clone(), &BroadcastConfig::new());
//! let outcome = pipeline.run().await.unwrap();
//!
//! assert!(matches!(outcome, RunOutcome::Completed(report) if report.inserted == 1));
//! assert_eq!(store.unresolved_count(), 0);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod event;
pub mod lock;
pub mod notification;
pub mod persistence;
pub mod pipeline;
pub mod scheduler;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::BroadcastConfig;
    pub use crate::event::{EventFields, EventKind, EventRecord};
    pub use crate::notification::{render, NotificationRecord, RenderOutcome, Visibility};
    pub use crate::persistence::{
        EventLog, InMemoryBroadcastStore, LockStore, NotificationStore, PostgresBroadcastStore,
        ReadConsistency, StoreError,
    };
    pub use crate::pipeline::{BroadcastPipeline, PipelineError, RunOutcome, RunReport};
    pub use crate::scheduler::{BroadcastScheduler, SchedulerError};
}

// Re-export key types at crate root
pub use config::BroadcastConfig;
pub use event::{EventFields, EventKind, EventRecord, MissingField};
pub use lock::JobLock;
pub use notification::{render, NotificationRecord, RenderOutcome, SuppressReason, Visibility};
pub use persistence::{
    EventLog, InMemoryBroadcastStore, LockError, LockRecord, LockStore, NotificationStore,
    PostgresBroadcastStore, ReadConsistency, StoreError,
};
pub use pipeline::{BroadcastPipeline, PipelineError, RunOutcome, RunReport};
pub use scheduler::{BroadcastScheduler, SchedulerError, SchedulerStatus};
