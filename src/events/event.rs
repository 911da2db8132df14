//! # Runtime events emitted by the supervisor and task handles.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: handle registration, start, finish, failure
//! - **Join events**: handles reaped or left behind by a sweep
//! - **Shutdown events**: cooperative shutdown requested / completed
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task name,
//! description, reasons and counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("Thread-3")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("Thread-3"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Task lifecycle events ===
    /// A handle was created and appended to the registry.
    ///
    /// Sets:
    /// - `task`: task name
    TaskRegistered,

    /// A handle is starting its thread or process.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `description`: `"{name} {target}()"`
    TaskStarting,

    /// The target returned normally (or the process exited successfully).
    ///
    /// Sets:
    /// - `task`: task name
    /// - `description`
    TaskFinished,

    /// The target failed; the handle now reports an exception.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `description`
    /// - `reason`: exception message
    TaskFailed,

    /// Termination of a running handle was requested.
    ///
    /// Sets:
    /// - `task`: task name
    TaskTerminateRequested,

    // === Join events ===
    /// A finished or failed handle was joined and removed from the registry.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: exception message, if the handle failed
    TaskJoined,

    /// A handle was still running when the join deadline ran out.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `description`
    /// - `timeout_ms`: the join budget that ran out
    TaskUnjoined,

    // === Shutdown events ===
    /// The cancellation flag was raised.
    ///
    /// Sets:
    /// - `count`: handles in the registry at that moment
    ShutdownRequested,

    /// The cancellation flag was reset.
    ///
    /// Sets:
    /// - `count`: live handles left behind
    ShutdownCompleted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Task description (`"{name} {target}()"`), if known.
    pub description: Option<Arc<str>>,
    /// Human-readable reason (exception messages, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Count of handles, for shutdown events.
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            description: None,
            reason: None,
            timeout_ms: None,
            count: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task description.
    #[inline]
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a handle count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::TaskStarting);
        let b = Event::new(EventKind::TaskFinished);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn compact_fields_saturate() {
        let ev = Event::new(EventKind::TaskUnjoined)
            .with_timeout(Duration::from_secs(u64::MAX / 2))
            .with_count(usize::MAX);
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
        assert_eq!(ev.count, Some(u32::MAX));
    }
}
