//! # Worker-side view of supervision.
//!
//! A [`TaskContext`] is handed to every thread target. It combines two cancellation
//! tiers:
//! - the handle's own [`CancellationToken`], cancelled by
//!   [`TaskHandle::terminate`](crate::TaskHandle::terminate);
//! - the shared `should-workers-exit` flag, raised by
//!   [`Supervisor::terminate_all`](crate::Supervisor::terminate_all).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::store::{self, Store};

/// Slice used by [`TaskContext::sleep`] between exit checks.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cancellation state visible to a running target.
#[derive(Clone)]
pub struct TaskContext {
    token: CancellationToken,
    flags: Arc<dyn Store>,
}

impl TaskContext {
    /// Creates a context from a token and a flag store.
    pub fn new(token: CancellationToken, flags: Arc<dyn Store>) -> Self {
        Self { token, flags }
    }

    /// The handle's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once this particular task was asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True when the task was cancelled or a global shutdown is in progress.
    pub fn should_exit(&self) -> bool {
        self.is_cancelled() || store::should_workers_exit(self.flags.as_ref())
    }

    /// Returns `Err(TaskError::Canceled)` when the task should exit.
    ///
    /// Handy as `ctx.checkpoint()?` at natural boundaries of a loop.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.should_exit() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Blocks the current thread for `dur`, waking early when the task should exit.
    ///
    /// Returns `false` if the sleep was cut short.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        loop {
            if self.should_exit() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CANCEL_FLAG_KEY, MemoryStore};

    #[test]
    fn flag_or_token_requests_exit() {
        let flags = Arc::new(MemoryStore::new());
        let ctx = TaskContext::new(CancellationToken::new(), flags.clone());
        assert!(!ctx.should_exit());
        assert!(ctx.checkpoint().is_ok());

        store::set_flag(flags.as_ref(), CANCEL_FLAG_KEY, true).unwrap();
        assert!(ctx.should_exit());
        assert_eq!(ctx.checkpoint(), Err(TaskError::Canceled));

        store::set_flag(flags.as_ref(), CANCEL_FLAG_KEY, false).unwrap();
        ctx.token().cancel();
        assert!(ctx.should_exit());
    }

    #[test]
    fn sleep_wakes_on_cancel() {
        let ctx = TaskContext::new(CancellationToken::new(), Arc::new(MemoryStore::new()));
        let token = ctx.token().clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            token.cancel();
        });
        let started = Instant::now();
        assert!(!ctx.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
    }
}
