//! Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] through which
//! the control loop and component phases publish [`Event`]s to the observer
//! listener.
//!
//! - [`Bus::publish`] sends an event to all subscribers (non-blocking).
//! - [`Bus::subscribe`] creates a new receiver for consuming events.

use tokio::sync::broadcast;

use crate::event::Event;

/// Broadcast channel for lifecycle events.
#[derive(Clone)]
pub(crate) struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Errors are ignored if there are no active subscribers.
    pub(crate) fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Subscribes to the bus and returns a new receiver.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
