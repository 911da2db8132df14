//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. Publishing is a plain synchronous call, so
//! worker threads that are not part of the tokio runtime can report their own
//! completion or failure.
//!
//! ```text
//! Publishers (many):                        Consumer (one):
//!   worker thread 1 ──┐
//!   worker thread N ──┼──► Bus ──► supervisor listener ──► SubscriberSet
//!   join sweep      ──┤
//!   Supervisor      ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: never waits for receivers.
//! - **Bounded capacity**: receivers that fall behind see `RecvError::Lagged(n)`.
//! - **No persistence**: events published with no receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn publish_without_receivers_is_harmless() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::TaskRegistered));
    }

    #[test]
    fn publish_from_plain_thread() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let b = bus.clone();
        std::thread::spawn(move || b.publish(Event::new(EventKind::TaskFinished).with_task("t")))
            .join()
            .unwrap();
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::TaskFinished);
    }
}
