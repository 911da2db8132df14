//! # Supervisor: owns the registry, the cancellation flag and event delivery.
//!
//! The [`Supervisor`] hands out [`TaskHandle`]s (registered immediately), reaps them
//! through the join coordinator, and drives cooperative shutdown through the shared
//! flag store.
//!
//! ## High-level architecture
//! ```text
//! caller ──► Supervisor::thread(name, task) / process(name, cmd)
//!                │  register ──► Registry (Vec<Arc<TaskHandle>>)
//!                ▼
//!           handle.start() ──► OS thread / child process
//!
//! caller ──► wait_for_all(handles, timeout)
//!                └─► JoinCoordinator: sweep every poll_interval, remove joined
//!
//! caller ──► terminate_all(wait)
//!                ├─► flag "should-workers-exit" = true   (workers poll it)
//!                ├─► wait_for_all(registry) | best-effort join(10ms) per live handle
//!                ├─► count stragglers
//!                └─► flag = false                         (always)
//!
//! events: handles / coordinator ── publish ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Supervisor, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::builder().build();
//!
//!     let ok = sup.thread("Thread-1", TaskFn::arc("collect", |_ctx| Ok(())));
//!     let bad = sup.thread("Thread-2", TaskFn::arc("fetch", |_ctx| Err(TaskError::fail("boom"))));
//!     ok.start().unwrap();
//!     bad.start().unwrap();
//!
//!     let left = sup.wait_for_all(vec![ok, bad.clone()], Duration::from_secs(5)).await;
//!     assert!(left.is_empty());
//!     assert_eq!(bad.exception_message().as_deref(), Some("boom"));
//! }
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::config::SupervisorConfig;
use crate::core::join::JoinCoordinator;
use crate::core::registry::Registry;
use crate::core::{builder::SupervisorBuilder, shutdown};
use crate::error::ForcedTerminationError;
use crate::events::{Bus, Event, EventKind};
use crate::store::{self, CANCEL_FLAG_KEY, Store};
use crate::tasks::{HandleEnv, ProcessCommand, TaskHandle, TaskId, TaskRef};

/// Owner of the task registry and the cooperative-cancellation flag.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    registry: Registry,
    flags: Arc<dyn Store>,
    /// Parent of every handle's cancellation token.
    tasks_token: CancellationToken,
    /// Stops the subscriber listener when the supervisor is dropped.
    listener_token: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        flags: Arc<dyn Store>,
        listener_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry: Registry::new(),
            flags,
            tasks_token: CancellationToken::new(),
            listener_token,
        }
    }

    /// Returns a builder with the default configuration.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new(SupervisorConfig::default())
    }

    /// Active configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Event bus shared with every handle.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Store holding the cancellation flag.
    pub fn flag_store(&self) -> &Arc<dyn Store> {
        &self.flags
    }

    fn env(&self) -> HandleEnv {
        HandleEnv {
            bus: self.bus.clone(),
            flags: Arc::clone(&self.flags),
            token: self.tasks_token.clone(),
        }
    }

    fn register(&self, handle: TaskHandle) -> Arc<TaskHandle> {
        let handle = Arc::new(handle);
        self.registry.register(Arc::clone(&handle));
        self.bus
            .publish(Event::new(EventKind::TaskRegistered).with_task(handle.name()));
        handle
    }

    /// Creates and registers a thread-backed handle (not started).
    pub fn thread(&self, name: impl Into<String>, task: TaskRef) -> Arc<TaskHandle> {
        self.register(TaskHandle::thread(name.into(), task, self.env()))
    }

    /// Creates and registers a process-backed handle (not started).
    pub fn process(&self, name: impl Into<String>, cmd: ProcessCommand) -> Arc<TaskHandle> {
        self.register(TaskHandle::process(name.into(), cmd, self.env()))
    }

    /// Snapshot of the registry, in creation order.
    pub fn handles(&self) -> Vec<Arc<TaskHandle>> {
        self.registry.snapshot()
    }

    /// Number of handles still registered.
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    fn coordinator(&self) -> JoinCoordinator<'_> {
        JoinCoordinator {
            registry: &self.registry,
            bus: &self.bus,
        }
    }

    /// One reaping pass with the configured per-handle join wait.
    ///
    /// Returns the handles that are still running.
    pub async fn join_sweep(&self, handles: &[Arc<TaskHandle>]) -> Vec<Arc<TaskHandle>> {
        self.join_sweep_with(handles, self.cfg.sweep_join_wait).await
    }

    /// One reaping pass with an explicit per-handle join wait.
    pub async fn join_sweep_with(
        &self,
        handles: &[Arc<TaskHandle>],
        max_join_wait: Duration,
    ) -> Vec<Arc<TaskHandle>> {
        self.coordinator().join_sweep(handles, max_join_wait).await
    }

    /// Reaps `handles` until all are joined or `timeout` elapsed.
    ///
    /// Returns the handles that could not be joined (each is reported as
    /// `TaskUnjoined`). Returns within `timeout + poll_interval` plus per-handle
    /// join waits.
    pub async fn wait_for_all(
        &self,
        handles: Vec<Arc<TaskHandle>>,
        timeout: Duration,
    ) -> Vec<Arc<TaskHandle>> {
        self.coordinator()
            .wait_for_all(
                handles,
                timeout,
                self.cfg.sweep_join_wait,
                self.cfg.poll_interval,
            )
            .await
    }

    /// [`wait_for_all`](Self::wait_for_all) over the whole registry with the
    /// configured `join_timeout`.
    pub async fn wait_for_registered(&self) -> Vec<Arc<TaskHandle>> {
        self.wait_for_all(self.registry.snapshot(), self.cfg.join_timeout)
            .await
    }

    /// Worker-facing read of the cancellation flag.
    pub fn should_workers_exit(&self) -> bool {
        store::should_workers_exit(self.flags.as_ref())
    }

    fn set_exit_flag(&self, value: bool) {
        if let Err(e) = store::set_flag(self.flags.as_ref(), CANCEL_FLAG_KEY, value) {
            warn!(error = %e, value, "failed to update cancellation flag");
        }
    }

    /// Cooperative shutdown of every registered handle.
    ///
    /// Raises the cancellation flag, then either waits for the whole registry
    /// (`wait_for_completion`) or gives each live handle one short join. The flag is
    /// reset to `false` afterwards in every case. Returns the number of handles
    /// still alive.
    pub async fn terminate_all(&self, wait_for_completion: bool) -> usize {
        self.set_exit_flag(true);
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_count(self.registry.len()));

        if wait_for_completion {
            self.wait_for_registered().await;
        } else {
            for h in self.registry.snapshot() {
                if h.is_alive() && !h.is_current_thread() {
                    h.join(self.cfg.best_effort_join).await;
                }
            }
        }

        let stragglers = self
            .registry
            .snapshot()
            .iter()
            .filter(|h| h.is_alive())
            .count();
        if stragglers > 0 {
            warn!(stragglers, "handles still alive after shutdown");
        }

        self.set_exit_flag(false);
        self.bus
            .publish(Event::new(EventKind::ShutdownCompleted).with_count(stragglers));
        stragglers
    }

    /// Requests termination of the live handle with OS identity `id`.
    ///
    /// ### Errors
    /// - [`ForcedTerminationError::NotRunning`] when no live handle matches;
    /// - [`ForcedTerminationError::Ambiguous`] when more than one does (nothing is
    ///   cancelled).
    pub fn terminate_task(&self, id: TaskId) -> Result<(), ForcedTerminationError> {
        let mut matched = self.registry.find_live(id);
        match matched.len() {
            0 => Err(ForcedTerminationError::NotRunning {
                task: id.to_string(),
            }),
            1 => matched.remove(0).terminate(),
            n => Err(ForcedTerminationError::Ambiguous { id, matched: n }),
        }
    }

    /// Number of `handles` that are alive and have not failed.
    pub fn running_count(handles: &[Arc<TaskHandle>]) -> usize {
        handles
            .iter()
            .filter(|h| h.is_alive() && !h.has_raised_exception())
            .count()
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then runs
    /// [`terminate_all`](Self::terminate_all).
    ///
    /// ### Errors
    /// Fails only if the signal listeners cannot be installed.
    pub async fn shutdown_on_signal(&self, wait_for_completion: bool) -> io::Result<usize> {
        let signal = shutdown::wait_for_shutdown_signal().await?;
        info!(signal, "shutdown signal received");
        Ok(self.terminate_all(wait_for_completion).await)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.listener_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::store::MemoryStore;
    use crate::tasks::{TaskContext, TaskFn};

    fn looping(ctx: TaskContext) -> Result<(), TaskError> {
        while !ctx.should_exit() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    #[tokio::test]
    async fn handles_are_registered_on_creation() {
        let sup = Supervisor::builder().build();
        let h = sup.thread("Thread-1", TaskFn::arc("noop", |_| Ok(())));
        assert_eq!(sup.registered_count(), 1);
        assert!(!h.is_started());
        assert!(!h.has_raised_exception());
    }

    #[tokio::test]
    async fn terminate_all_resets_flag() {
        let sup = Supervisor::builder().build();
        assert!(!sup.should_workers_exit());

        let h = sup.thread("Thread-1", TaskFn::arc("loop", looping));
        h.start().unwrap();

        let stragglers = sup.terminate_all(true).await;
        assert_eq!(stragglers, 0);
        assert!(!sup.should_workers_exit());
        assert_eq!(sup.registered_count(), 0);
    }

    #[tokio::test]
    async fn flag_is_visible_to_workers_while_raised() {
        let flags: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let sup = Supervisor::builder()
            .with_flag_store(Arc::clone(&flags))
            .build();
        store::set_flag(flags.as_ref(), CANCEL_FLAG_KEY, true).unwrap();
        assert!(sup.should_workers_exit());
        sup.terminate_all(false).await;
        assert!(!sup.should_workers_exit());
    }

    #[tokio::test]
    async fn best_effort_shutdown_counts_stubborn_workers() {
        let sup = Supervisor::builder().build();
        let mut rx = sup.bus().subscribe();
        let stubborn = sup.thread(
            "Thread-1",
            TaskFn::arc("deaf", |_| {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            }),
        );
        stubborn.start().unwrap();

        let begun = std::time::Instant::now();
        let stragglers = sup.terminate_all(false).await;
        assert_eq!(stragglers, 1);
        assert!(begun.elapsed() < Duration::from_millis(300));
        assert!(!sup.should_workers_exit());
        assert!(stubborn.is_alive());

        let completed = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::ShutdownCompleted)
            .unwrap();
        assert_eq!(completed.count, Some(1));

        assert!(sup.wait_for_registered().await.is_empty());
        assert_eq!(sup.registered_count(), 0);
    }

    #[tokio::test]
    async fn failed_spawn_does_not_pin_the_registry() {
        let sup = Supervisor::builder().build();
        let h = sup.process("Process-1", ProcessCommand::new("/nonexistent/procvisor-worker"));
        assert!(h.start().is_err());
        assert!(h.has_raised_exception());

        assert_eq!(sup.terminate_all(true).await, 0);
        assert_eq!(sup.registered_count(), 0);
    }

    #[tokio::test]
    async fn terminate_task_by_id() {
        let sup = Supervisor::builder().build();
        let h = sup.thread("Thread-1", TaskFn::arc("loop", looping));

        let fake = TaskId::Process(u32::MAX);
        assert!(matches!(
            sup.terminate_task(fake),
            Err(ForcedTerminationError::NotRunning { .. })
        ));

        h.start().unwrap();
        let id = h.id().unwrap();
        sup.terminate_task(id).unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(matches!(
            sup.terminate_task(id),
            Err(ForcedTerminationError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn running_count_skips_failed_and_finished() {
        let sup = Supervisor::builder().build();
        let running = sup.thread("Thread-1", TaskFn::arc("loop", looping));
        let failed = sup.thread("Thread-2", TaskFn::arc("bad", |_| Err(TaskError::fail("x"))));
        running.start().unwrap();
        failed.start().unwrap();
        assert!(failed.join(Duration::from_secs(5)).await);

        let handles = sup.handles();
        assert_eq!(Supervisor::running_count(&handles), 1);

        running.terminate().unwrap();
        assert!(sup.wait_for_all(handles, Duration::from_secs(5)).await.is_empty());
    }
}
