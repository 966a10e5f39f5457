//! Store change notifications
//!
//! Every mutation of the book reports what it touched through an [`EventBus`].
//! The view layer subscribes and refreshes the affected rows. Notification is
//! synchronous with the mutation: by the time a `Book` method returns, all of
//! its events are already queued on every receiver.

use crate::ids::EntityRef;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity for desktop use
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Store event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// A displayed field or a usage count of an entity changed
    ValueModified { entity: EntityRef },

    /// A new entity row was inserted
    Inserted { entity: EntityRef },

    /// An entity row was removed
    Removed { entity: EntityRef },

    /// Items of a planning day were added or removed, or the day itself
    /// was created or pruned
    PlanningChanged { date: NaiveDate },

    /// The whole store was replaced (document load)
    Reset,
}

impl StoreEvent {
    /// Entity the event is about, if any
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            StoreEvent::ValueModified { entity }
            | StoreEvent::Inserted { entity }
            | StoreEvent::Removed { entity } => Some(*entity),
            StoreEvent::PlanningChanged { .. } | StoreEvent::Reset => None,
        }
    }
}

/// Event distribution bus for store notifications
///
/// Wraps a `tokio::sync::broadcast` channel:
/// - Non-blocking publish (no subscriber is not an error for the store)
/// - Multiple subscribers (one per open view)
/// - Lagged detection for receivers that never drain
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StoreEvent,
    ) -> Result<usize, broadcast::error::SendError<StoreEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Drain every event currently queued on `rx` without waiting
///
/// Lagged gaps are skipped; the remaining events are still returned.
pub fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    use broadcast::error::TryRecvError;

    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event receiver lagged behind the store");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    events
}
