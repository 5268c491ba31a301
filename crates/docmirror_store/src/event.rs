//! Live change events delivered over a subscription channel.

use crate::record::Record;
use std::sync::Arc;

/// The kind of change a live event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// A record was created.
    Create,
    /// An existing record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

/// A single change event for a subscribed topic.
///
/// Events carry the affected record as the server saw it after the change
/// (for deletes, as it was at deletion time).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    /// The kind of change.
    pub action: EventAction,
    /// The affected record.
    pub record: Record,
}

impl RecordEvent {
    /// Creates a create event.
    pub fn create(record: Record) -> Self {
        Self {
            action: EventAction::Create,
            record,
        }
    }

    /// Creates an update event.
    pub fn update(record: Record) -> Self {
        Self {
            action: EventAction::Update,
            record,
        }
    }

    /// Creates a delete event.
    pub fn delete(record: Record) -> Self {
        Self {
            action: EventAction::Delete,
            record,
        }
    }
}

/// Callback invoked for every event delivered on a subscription.
pub type EventCallback = Arc<dyn Fn(RecordEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_tag_actions() {
        let record = Record::new("r1", "posts");
        assert_eq!(
            RecordEvent::create(record.clone()).action,
            EventAction::Create
        );
        assert_eq!(
            RecordEvent::update(record.clone()).action,
            EventAction::Update
        );
        assert_eq!(RecordEvent::delete(record).action, EventAction::Delete);
    }
}
