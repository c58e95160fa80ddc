//! Notification records and the renderer that produces them

mod record;
mod render;

pub use record::{NotificationRecord, Visibility, SYSTEM_SOURCE};
pub use render::{render, RenderOutcome, SuppressReason, NO_MANAGER};
