//! Domain events for decoupled notification of assembly outcomes.
//!
//! Events are published after assembly results are persisted. Other
//! components (audit, reporting) can subscribe without coupling to the
//! assembler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Every segment of an exam was assembled and persisted
    SegmentsInitialized {
        exam_id: String,
        assessment_key: String,
        segment_count: usize,
        total_items: u32,
        timestamp: DateTime<Utc>,
    },

    /// Field-test item groups were embedded into an exam segment
    FieldTestGroupsAssigned {
        exam_id: String,
        segment_key: String,
        group_keys: Vec<String>,
        item_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// Assembly aborted before anything was persisted
    AssemblyFailed {
        exam_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::SegmentsInitialized {
            exam_id: "exam-1".into(),
            assessment_key: "(SBAC)MATH-3".into(),
            segment_count: 2,
            total_items: 40,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::SegmentsInitialized { exam_id, total_items, .. } => {
                assert_eq!(exam_id, "exam-1");
                assert_eq!(*total_items, 40);
            }
            _ => panic!("Expected SegmentsInitialized event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::AssemblyFailed {
            exam_id: "exam-1".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
