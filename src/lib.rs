//! # procvisor
//!
//! **Procvisor** supervises blocking work running on OS threads and in child
//! processes: bounded joins, failure capture, cooperative shutdown, PID-file daemons
//! with signal escalation, and single-use worker processes with hard timeouts.
//!
//! ## Architecture
//! ```text
//!        caller
//!          │ thread(name, task) / process(name, cmd)
//!          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Supervisor                                                   │
//! │  - Registry         Vec<Arc<TaskHandle>>, insertion ordered  │
//! │  - flag store       "should-workers-exit" (memory or files)  │
//! │  - JoinCoordinator  join_sweep / wait_for_all                │
//! │  - Bus              broadcast of runtime events              │
//! └──────┬──────────────────┬──────────────────┬─────────────────┘
//!        ▼                  ▼                  ▼
//!   TaskHandle          TaskHandle         TaskHandle
//!   (OS thread,         (OS thread)        (child process)
//!    catch_unwind)
//!        │ publish TaskStarting / TaskFinished / TaskFailed
//!        ▼
//!       Bus ──► listener ──► SubscriberSet ──► LogWriter (tracing), custom subscribers
//!
//! Daemon:            start ─► pid file ─► stop: INT/TERM ... KILL ─► pid file removed
//! BoundedWorkerPool: create (retry + backoff) ─► run once ≤ timeout ─► teardown
//! ```
//!
//! ### Handle lifecycle
//! ```text
//! NotStarted ──start()──► Running ──► Finished ─────────────┐
//!                                 └─► FinishedWithException ┴─► joined, removed
//! ```
//!
//! ## Failure model
//! | Kind                     | Type                         | Surfaces as                        |
//! |--------------------------|------------------------------|------------------------------------|
//! | infrastructure           | [`SupervisorError`]          | returned                           |
//! | failure inside a target  | [`TaskError`]                | captured on the [`TaskHandle`]     |
//! | forced termination       | [`ForcedTerminationError`]   | returned by `terminate*`           |
//! | best effort (signals...) | -                            | logged                             |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use procvisor::{Subscribe, Supervisor, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(procvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder().with_subscribers(subs).build();
//!
//!     let worker = sup.thread(
//!         "Thread-1",
//!         TaskFn::arc("poll_queue", |ctx| {
//!             while !ctx.should_exit() {
//!                 ctx.sleep(Duration::from_millis(20));
//!             }
//!             Err(TaskError::Canceled)
//!         }),
//!     );
//!     worker.start().unwrap();
//!
//!     // Raise the shared flag, wait for every handle, reset the flag.
//!     let stragglers = sup.terminate_all(true).await;
//!     assert_eq!(stragglers, 0);
//!     assert!(!worker.has_raised_exception());
//! }
//! ```
mod core;
mod daemon;
mod error;
mod events;
mod payload;
mod policies;
mod pool;
mod store;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    Registry, Supervisor, SupervisorBuilder, SupervisorConfig, wait_for_shutdown_signal,
};
pub use daemon::{
    Daemon, DaemonConfig, EscalationSchedule, EscalationStep, OsProcessControl, ProcessControl,
    Signal,
};
pub use error::{ForcedTerminationError, StoreError, SupervisorError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use payload::{Dispatcher, PAYLOAD_TTL, TaskPayload, payload_key};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use pool::{
    BoundedWorkerPool, ErrorCollector, ErrorSink, Launcher, OsLauncher, PoolConfig, WorkerOutput,
};
pub use store::{
    CANCEL_FLAG_KEY, FileStore, MemoryStore, Store, get_flag, set_flag, should_workers_exit,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{ProcessCommand, Task, TaskContext, TaskFn, TaskHandle, TaskId, TaskKind, TaskRef};

// Built-in subscriber rendering events through `tracing`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
