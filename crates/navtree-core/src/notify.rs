//! Structural change notification

use chrono::{DateTime, Utc};
use navtree_model::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use uuid::Uuid;

/// What kind of change produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A node was moved or reordered
    Moved,
    /// A node subtree was deleted
    Deleted,
}

/// Nodes whose position or existence changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChangeEvent {
    /// Event id
    pub event_id: Uuid,
    /// When the change committed
    pub occurred_at: DateTime<Utc>,
    /// Change kind
    pub kind: ChangeKind,
    /// Affected nodes
    pub affected: BTreeSet<NodeId>,
}

impl StructuralChangeEvent {
    /// New event stamped now
    #[must_use]
    pub fn new(kind: ChangeKind, affected: BTreeSet<NodeId>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
            affected,
        }
    }
}

/// Sink for structural change events
#[cfg_attr(test, mockall::automock)]
pub trait ChangeNotifier: Send + Sync {
    /// Publish an event; delivery is best effort
    fn publish(&self, event: StructuralChangeEvent);
}

/// Fan-out notifier over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<StructuralChangeEvent>,
}

impl BroadcastNotifier {
    /// Create notifier buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscription
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StructuralChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn publish(&self, event: StructuralChangeEvent) {
        let affected = event.affected.len();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(affected, receivers, "published structural change"),
            Err(_) => tracing::trace!(affected, "structural change without subscribers"),
        }
    }
}

/// Notifier that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn publish(&self, _event: StructuralChangeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();
        let affected: BTreeSet<NodeId> = ["a".into(), "b".into()].into_iter().collect();

        notifier.publish(StructuralChangeEvent::new(ChangeKind::Moved, affected.clone()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Moved);
        assert_eq!(event.affected, affected);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        BroadcastNotifier::new(1).publish(StructuralChangeEvent::new(ChangeKind::Deleted, BTreeSet::new()));
    }

    #[test]
    fn mock_records_publication() {
        let mut mock = MockChangeNotifier::new();
        mock.expect_publish()
            .withf(|e| e.kind == ChangeKind::Deleted)
            .times(1)
            .return_const(());
        mock.publish(StructuralChangeEvent::new(ChangeKind::Deleted, BTreeSet::new()));
    }
}
