//! # Join coordination: reaping finished handles out of the registry.
//!
//! ```text
//! wait_for_all(handles, timeout)
//!   loop until empty or deadline:
//!     join_sweep(pending) ──► raised?   → join, remove, TaskJoined{reason}
//!                          ├► ended?    → join, remove, TaskJoined
//!                          ├► running   → kept in the returned bucket
//!                          └► unstarted → logged, left registered, dropped from bucket
//!                             (a failed spawn counts as raised)
//!     sleep(poll_interval)
//!   final join_sweep, TaskUnjoined for each leftover
//! ```
//!
//! ## Rules
//! - A handle leaves the registry only after its join, or after its exception was
//!   reported.
//! - `wait_for_all` always performs one final sweep after the deadline.
//! - Deadlines use the monotonic tokio clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::warn;

use crate::core::registry::Registry;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskHandle;

/// Registry and bus a sweep reports into.
pub(crate) struct JoinCoordinator<'a> {
    pub registry: &'a Registry,
    pub bus: &'a Bus,
}

impl JoinCoordinator<'_> {
    /// One pass over `handles`; returns the ones still running.
    pub async fn join_sweep(
        &self,
        handles: &[Arc<TaskHandle>],
        max_join_wait: Duration,
    ) -> Vec<Arc<TaskHandle>> {
        let mut still_running = Vec::new();
        let mut ended = Vec::new();

        for h in handles {
            if !h.is_started() && !h.has_raised_exception() {
                warn!(task = h.name(), "handle was never started; it cannot be joined");
                continue;
            }
            if h.has_raised_exception() || !h.is_alive() {
                ended.push(h);
            } else {
                still_running.push(Arc::clone(h));
            }
        }

        for h in ended {
            let joined = h.join(max_join_wait).await;
            let failure = h.exception_message();
            if !joined && failure.is_none() {
                still_running.push(Arc::clone(h));
                continue;
            }
            if self.registry.remove(h) {
                let mut ev = Event::new(EventKind::TaskJoined).with_task(h.name());
                if let Some(msg) = failure {
                    warn!(task = h.name(), error = %msg, "Exception raised by task");
                    ev = ev.with_reason(msg);
                }
                self.bus.publish(ev);
            }
        }

        still_running
    }

    /// Sweeps until nothing is left or `timeout` elapsed; returns the unjoined handles.
    pub async fn wait_for_all(
        &self,
        handles: Vec<Arc<TaskHandle>>,
        timeout: Duration,
        sweep_join_wait: Duration,
        poll_interval: Duration,
    ) -> Vec<Arc<TaskHandle>> {
        if handles.is_empty() {
            return handles;
        }

        let deadline = Instant::now() + timeout;
        let mut pending = handles;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            pending = self.join_sweep(&pending, sweep_join_wait).await;
            if pending.is_empty() {
                return pending;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            time::sleep(poll_interval.min(remaining)).await;
        }

        let leftovers = self.join_sweep(&pending, sweep_join_wait).await;
        for h in &leftovers {
            let description = h.description().unwrap_or(h.name());
            warn!(task = %description, ?timeout, "Could not join task");
            self.bus.publish(
                Event::new(EventKind::TaskUnjoined)
                    .with_task(h.name())
                    .with_description(description)
                    .with_timeout(timeout),
            );
        }
        leftovers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::store::MemoryStore;
    use crate::tasks::{HandleEnv, TaskContext, TaskFn};
    use parking_lot::Mutex;
    use std::fmt::Write as _;
    use tokio_util::sync::CancellationToken;
    use tracing::field::{Field, Visit};
    use tracing::{Level, Metadata, span};

    /// Thread-local tracing subscriber keeping the fields of every WARN event.
    #[derive(Clone, Default)]
    struct WarnCapture(Arc<Mutex<Vec<String>>>);

    impl WarnCapture {
        fn lines(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct Fields(String);

    impl Visit for Fields {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            let _ = write!(self.0, "{}={:?} ", field.name(), value);
        }
    }

    impl tracing::Subscriber for WarnCapture {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &span::Attributes<'_>) -> span::Id {
            span::Id::from_u64(1)
        }
        fn record(&self, _: &span::Id, _: &span::Record<'_>) {}
        fn record_follows_from(&self, _: &span::Id, _: &span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == Level::WARN {
                let mut fields = Fields(String::new());
                event.record(&mut fields);
                self.0.lock().push(fields.0);
            }
        }
        fn enter(&self, _: &span::Id) {}
        fn exit(&self, _: &span::Id) {}
    }

    fn handle<F>(bus: &Bus, name: &str, f: F) -> Arc<TaskHandle>
    where
        F: Fn(TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        let env = HandleEnv {
            bus: bus.clone(),
            flags: Arc::new(MemoryStore::new()),
            token: CancellationToken::new(),
        };
        Arc::new(TaskHandle::thread(name.into(), TaskFn::arc("work", f), env))
    }

    #[tokio::test]
    async fn empty_list_is_a_noop() {
        let (registry, bus) = (Registry::new(), Bus::new(8));
        let mut rx = bus.subscribe();
        let jc = JoinCoordinator { registry: &registry, bus: &bus };
        let left = jc
            .wait_for_all(Vec::new(), Duration::from_secs(1), Duration::from_millis(10), Duration::from_millis(10))
            .await;
        assert!(left.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let (registry, bus) = (Registry::new(), Bus::new(64));
        let h = handle(&bus, "Thread-1", |_| Err(TaskError::fail("boom")));
        registry.register(Arc::clone(&h));
        h.start().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);

        let jc = JoinCoordinator { registry: &registry, bus: &bus };
        let handles = vec![Arc::clone(&h)];
        assert!(jc.join_sweep(&handles, Duration::from_millis(200)).await.is_empty());
        assert!(jc.join_sweep(&handles, Duration::from_millis(200)).await.is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn exceptions_are_logged_without_subscribers() {
        let capture = WarnCapture::default();
        let _guard = tracing::subscriber::set_default(capture.clone());

        let (registry, bus) = (Registry::new(), Bus::new(64));
        let h = handle(&bus, "Thread-9", |_| Err(TaskError::fail("boom")));
        registry.register(Arc::clone(&h));
        h.start().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);

        let jc = JoinCoordinator { registry: &registry, bus: &bus };
        assert!(jc.join_sweep(&[Arc::clone(&h)], Duration::from_millis(200)).await.is_empty());

        let lines = capture.lines();
        assert!(
            lines.iter().any(|l| l.contains("Thread-9") && l.contains("boom")),
            "{lines:?}"
        );
    }

    #[tokio::test]
    async fn unstarted_handles_stay_registered() {
        let (registry, bus) = (Registry::new(), Bus::new(8));
        let h = handle(&bus, "Thread-2", |_| Ok(()));
        registry.register(Arc::clone(&h));

        let jc = JoinCoordinator { registry: &registry, bus: &bus };
        let left = jc.join_sweep(&[Arc::clone(&h)], Duration::from_millis(10)).await;
        assert!(left.is_empty());
        assert!(registry.contains(&h));
    }

    #[tokio::test]
    async fn deadline_returns_running_handles() {
        let capture = WarnCapture::default();
        let _guard = tracing::subscriber::set_default(capture.clone());

        let (registry, bus) = (Registry::new(), Bus::new(64));
        let mut rx = bus.subscribe();
        let h = handle(&bus, "Thread-3", |ctx| {
            while !ctx.should_exit() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        });
        registry.register(Arc::clone(&h));
        h.start().unwrap();

        let jc = JoinCoordinator { registry: &registry, bus: &bus };
        let started = std::time::Instant::now();
        let left = jc
            .wait_for_all(
                vec![Arc::clone(&h)],
                Duration::from_millis(150),
                Duration::from_millis(20),
                Duration::from_millis(50),
            )
            .await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(left.len(), 1);
        assert!(registry.contains(&h));

        let unjoined: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::TaskUnjoined)
            .collect();
        assert_eq!(unjoined.len(), 1);
        assert_eq!(unjoined[0].task.as_deref(), Some("Thread-3"));
        assert_eq!(unjoined[0].description.as_deref(), Some("Thread-3 work()"));
        assert_eq!(unjoined[0].timeout_ms, Some(150));

        let lines = capture.lines();
        assert!(lines.iter().any(|l| l.contains("Thread-3 work()")), "{lines:?}");

        h.terminate().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
    }
}
