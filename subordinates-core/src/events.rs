//! Notifications emitted after committed hierarchy changes

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// One event per successful mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum SubordinateEvent {
    AddSub {
        controller_id: String,
    },
    AddSubsub {
        controller_id: String,
        via: String,
    },
    Del {
        controller_id: String,
    },
    SetEnabled {
        controller_id: String,
        enabled: bool,
    },
    UpdateSub {
        controller_id: String,
        custom_name: String,
    },
    UpdateSubsub {
        controller_id: String,
        custom_name: String,
    },
}

impl SubordinateEvent {
    pub fn controller_id(&self) -> &str {
        match self {
            SubordinateEvent::AddSub { controller_id }
            | SubordinateEvent::AddSubsub { controller_id, .. }
            | SubordinateEvent::Del { controller_id }
            | SubordinateEvent::SetEnabled { controller_id, .. }
            | SubordinateEvent::UpdateSub { controller_id, .. }
            | SubordinateEvent::UpdateSubsub { controller_id, .. } => controller_id,
        }
    }
}

/// Receiver of hierarchy events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SubordinateEvent);
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<SubordinateEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubordinateEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: SubordinateEvent) {
        // No subscribers is fine
        if self.sender.send(event).is_err() {
            trace!("Event dropped, no subscribers");
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: SubordinateEvent) {}
}
