//! Domain events read from the event log

mod kind;
mod record;

pub use kind::EventKind;
pub use record::{EventFields, EventRecord, MissingField};
