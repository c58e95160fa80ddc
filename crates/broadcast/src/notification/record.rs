//! Notification records written by the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{EventKind, EventRecord};

/// Source marker for notifications produced by the system itself
pub const SYSTEM_SOURCE: &str = "!";

/// Who may see a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "users", rename_all = "snake_case")]
pub enum Visibility {
    /// Shown to every observer
    Broadcast,

    /// Shown only to the listed user identifiers
    Restricted(Vec<String>),
}

impl Visibility {
    pub fn is_visible_to(&self, user: &str) -> bool {
        match self {
            Self::Broadcast => true,
            Self::Restricted(users) => users.iter().any(|u| u == user),
        }
    }

    /// Users a restricted notification targets (empty for broadcasts)
    pub fn users(&self) -> &[String] {
        match self {
            Self::Broadcast => &[],
            Self::Restricted(users) => users,
        }
    }
}

/// A rendered, human-readable projection of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    /// Event this notification was rendered from
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub visibility: Visibility,
    pub source: String,
    /// Copied from the source event; drives expiry
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_event(event: &EventRecord, message: String, visibility: Visibility) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id: event.id,
            kind: event.kind.clone(),
            message,
            visibility,
            source: SYSTEM_SOURCE.to_string(),
            created_at: event.created_at,
        }
    }
}
