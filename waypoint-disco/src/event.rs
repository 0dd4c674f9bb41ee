//! Instance-level events.

use std::sync::Arc;

use crate::instance::Instance;

/// Operation carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOp {
    /// A new instance appeared.
    Add,
    /// An existing instance was seen again, possibly changed.
    Update,
    /// An existing instance disappeared.
    Delete,
}

/// A change to one instance of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened to the instance.
    pub op: EventOp,

    /// The full instance the event is about.
    pub instance: Arc<Instance>,
}

impl Event {
    /// Create an add event.
    #[must_use]
    pub fn add(instance: Arc<Instance>) -> Self {
        Self {
            op: EventOp::Add,
            instance,
        }
    }

    /// Create an update event.
    #[must_use]
    pub fn update(instance: Arc<Instance>) -> Self {
        Self {
            op: EventOp::Update,
            instance,
        }
    }

    /// Create a delete event.
    #[must_use]
    pub fn delete(instance: Arc<Instance>) -> Self {
        Self {
            op: EventOp::Delete,
            instance,
        }
    }
}
