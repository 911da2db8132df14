//! # LogWriter: renders events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG procvisor: Starting Thread-1 collect()
//!  WARN procvisor: Exception raised by Thread-3 fetch(): boom
//! DEBUG procvisor: joined task=Thread-3 error=boom
//! DEBUG procvisor: Could not join Process-2 sleep() within 360000ms
//!  INFO procvisor: shutdown completed stragglers=0
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let description = e.description.as_deref().unwrap_or(task);
        let reason = e.reason.as_deref().unwrap_or("unknown");

        match e.kind {
            EventKind::TaskRegistered => debug!(target: "procvisor", "registered task={task}"),
            EventKind::TaskStarting => debug!(target: "procvisor", "Starting {description}"),
            EventKind::TaskFinished => debug!(target: "procvisor", "finished {description}"),
            EventKind::TaskFailed => {
                warn!(target: "procvisor", "Exception raised by {description}: {reason}")
            }
            EventKind::TaskTerminateRequested => {
                info!(target: "procvisor", "termination requested task={task}")
            }
            EventKind::TaskJoined => match &e.reason {
                Some(err) => debug!(target: "procvisor", "joined task={task} error={err}"),
                None => debug!(target: "procvisor", "joined task={task}"),
            },
            // The join coordinator warns about these itself.
            EventKind::TaskUnjoined => debug!(
                target: "procvisor",
                "Could not join {description} within {}ms",
                e.timeout_ms.unwrap_or_default()
            ),
            EventKind::ShutdownRequested => info!(
                target: "procvisor",
                "shutdown requested handles={}",
                e.count.unwrap_or_default()
            ),
            EventKind::ShutdownCompleted => info!(
                target: "procvisor",
                "shutdown completed stragglers={}",
                e.count.unwrap_or_default()
            ),
            EventKind::SubscriberOverflow => {
                warn!(target: "procvisor", "subscriber overflow {reason}")
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "procvisor", "subscriber {task} panicked: {reason}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
