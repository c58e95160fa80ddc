//! Persistence layer for the broadcast pipeline
//!
//! This module provides:
//! - [`EventLog`], [`NotificationStore`] and [`LockStore`] traits
//! - [`InMemoryBroadcastStore`] for testing
//! - [`PostgresBroadcastStore`] for production

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryBroadcastStore;
pub use postgres::PostgresBroadcastStore;
pub use store::{
    EventLog, LockError, LockRecord, LockStore, NotificationStore, ReadConsistency, StoreError,
};
