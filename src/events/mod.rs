//! Policy change events.
//!
//! Services publish a [`PolicyEvent`] after every mutation that can change
//! the fact set. The [`PolicyInvalidationListener`] reacts to those events by
//! reloading the enforcer; it never receives direct callbacks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Services      │────>│    EventBus     │────>│  Invalidation   │
//! │ (rules, grants) │     │  (broadcast)    │     │    Listener     │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!                                  │
//!                         ┌────────┴────────┐
//!                         │ RedisEventRelay │  (other nodes)
//!                         └─────────────────┘
//! ```

mod listener;
#[cfg(feature = "redis")]
mod relay;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
pub use listener::PolicyInvalidationListener;
#[cfg(feature = "redis")]
pub use relay::RedisEventRelay;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default channel capacity for the event bus.
/// This determines how many events can be buffered before slow receivers
/// start missing events (lagging).
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event topics. The wire names are shared with other nodes through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventTopic {
    /// A permission rule, role or tenant changed
    RuleChange,
    /// A subject or grant changed
    UserChange,
}

impl EventTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTopic::RuleChange => "rule-change",
            EventTopic::UserChange => "user-change",
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// The entity a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tenant,
    Role,
    Subject,
    Grant,
    Rule,
}

impl EntityKind {
    /// The topic mutations of this entity are published on.
    pub fn topic(&self) -> EventTopic {
        match self {
            EntityKind::Tenant | EntityKind::Role | EntityKind::Rule => EventTopic::RuleChange,
            EntityKind::Subject | EntityKind::Grant => EventTopic::UserChange,
        }
    }
}

/// A mutation notice. The payload identifies what changed; consumers reload
/// from the store rather than trusting event contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvent {
    pub topic: EventTopic,
    pub kind: ChangeKind,
    pub entity: EntityKind,
    pub id: i64,
    /// Node that produced the event. Used by the relay to avoid echo loops.
    pub origin: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Central event bus for policy change events.
///
/// Uses a tokio broadcast channel to allow multiple subscribers to receive
/// the same events. Events are cloned for each subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PolicyEvent>,
    origin: Uuid,
    /// Counter for total events published (for metrics)
    events_published: Arc<AtomicU64>,
    /// Counter for events dropped due to no subscribers
    events_dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            origin: Uuid::new_v4(),
            events_published: Arc::new(AtomicU64::new(0)),
            events_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Identifier of this process, stamped on locally produced events.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Publish a change to `entity` made by this node.
    pub fn notify(&self, entity: EntityKind, kind: ChangeKind, id: i64) -> usize {
        self.publish(PolicyEvent {
            topic: entity.topic(),
            kind,
            entity,
            id,
            origin: self.origin,
            timestamp: Utc::now(),
        })
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, the event is dropped and 0 is returned.
    /// Never blocks.
    pub fn publish(&self, event: PolicyEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            topic = %event.topic,
            entity = ?event.entity,
            kind = ?event.kind,
            id = event.id,
            "Publishing policy event"
        );

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                // No active subscribers, event is dropped
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Subscribe to events from this bus.
    ///
    /// If the receiver falls behind, it will receive `RecvError::Lagged`
    /// indicating how many events were missed.
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.sender.subscribe()
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events published.
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Get the number of events dropped (no subscribers).
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
