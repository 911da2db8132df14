//! # TaskHandle: supervisory wrapper around one thread or process.
//!
//! A handle is created (and registered) by the [`Supervisor`](crate::Supervisor) in the
//! *not started* state, and is shared as `Arc<TaskHandle>` between the caller and the
//! registry.
//!
//! ## Lifecycle
//! ```text
//! NotStarted ──start()──► Running ──► Finished
//!     │                           └─► FinishedWithException
//!     └──spawn error─────────────────────────┤
//!                          join(wait) ───────┴──► Joined (removed from registry)
//! ```
//!
//! ## Rules
//! - `start()` computes the description `"{name} {target}()"` before anything is logged.
//! - A thread target runs inside an error boundary: `Err` or a panic marks the handle
//!   as failed and records the message; nothing is re-raised to a joiner.
//! - A process handle reports an exception only when its command was built with
//!   `inspect_exit_status(true)` and the child exits unsuccessfully.
//! - Termination of a thread is a cancellation *request* through its token; termination
//!   of a process is `SIGKILL`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ForcedTerminationError, SupervisorError};
use crate::events::{Bus, Event, EventKind};
use crate::store::Store;
use crate::tasks::{ProcessCommand, Task, TaskContext, TaskRef};

/// Poll step while waiting for a handle to become joinable.
const JOIN_POLL: Duration = Duration::from_millis(5);

/// OS-assigned identity of a started handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Identifier of the OS thread running the target.
    Thread(ThreadId),
    /// PID of the child process.
    Process(u32),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Thread(id) => write!(f, "{id:?}"),
            TaskId::Process(pid) => write!(f, "pid {pid}"),
        }
    }
}

/// Flavour of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs a [`Task`] on a dedicated OS thread.
    Thread,
    /// Runs a [`ProcessCommand`] as a child process.
    Process,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Thread => f.write_str("thread"),
            TaskKind::Process => f.write_str("process"),
        }
    }
}

/// Runtime plumbing a handle needs from its supervisor.
#[derive(Clone)]
pub(crate) struct HandleEnv {
    pub bus: Bus,
    pub flags: Arc<dyn Store>,
    pub token: CancellationToken,
}

/// Completion state written by the worker thread and read by pollers.
#[derive(Default)]
struct Outcome {
    finished: AtomicBool,
    raised: AtomicBool,
    message: Mutex<Option<String>>,
}

impl Outcome {
    fn record_exception(&self, message: String) {
        *self.message.lock() = Some(message);
        self.raised.store(true, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

enum Launch {
    Thread(TaskRef),
    Process(ProcessCommand),
}

enum State {
    NotStarted(Launch),
    Thread {
        id: ThreadId,
        /// `None` once joined.
        join: Option<JoinHandle<()>>,
    },
    Process {
        pid: u32,
        child: Child,
        /// `Some` once the child was reaped.
        status: Option<ExitStatus>,
    },
    /// `start()` failed; the handle is finished with an exception.
    SpawnFailed,
}

enum JoinAttempt {
    NotStarted,
    Running,
    Joined,
}

/// Supervisory wrapper around one concurrently executing thread or process.
pub struct TaskHandle {
    name: String,
    target: String,
    kind: TaskKind,
    inspect_exit_status: bool,
    description: OnceLock<String>,
    token: CancellationToken,
    outcome: Arc<Outcome>,
    state: Mutex<State>,
    env: HandleEnv,
}

impl TaskHandle {
    pub(crate) fn thread(name: String, task: TaskRef, env: HandleEnv) -> Self {
        Self {
            target: task.name().to_string(),
            kind: TaskKind::Thread,
            inspect_exit_status: false,
            ..Self::base(name, State::NotStarted(Launch::Thread(task)), env)
        }
    }

    pub(crate) fn process(name: String, cmd: ProcessCommand, env: HandleEnv) -> Self {
        Self {
            target: cmd.target_name().to_string(),
            kind: TaskKind::Process,
            inspect_exit_status: cmd.inspects_exit_status(),
            ..Self::base(name, State::NotStarted(Launch::Process(cmd)), env)
        }
    }

    fn base(name: String, state: State, env: HandleEnv) -> Self {
        Self {
            name,
            target: String::new(),
            kind: TaskKind::Thread,
            inspect_exit_status: false,
            description: OnceLock::new(),
            token: env.token.child_token(),
            outcome: Arc::new(Outcome::default()),
            state: Mutex::new(state),
            env,
        }
    }

    /// Human label of the handle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target name: the task's name, or the program's file name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Thread or process.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// `"{name} {target}()"`, available once started.
    pub fn description(&self) -> Option<&str> {
        self.description.get().map(String::as_str)
    }

    /// OS identity, available once started.
    pub fn id(&self) -> Option<TaskId> {
        match &*self.state.lock() {
            State::NotStarted(_) | State::SpawnFailed => None,
            State::Thread { id, .. } => Some(TaskId::Thread(*id)),
            State::Process { pid, .. } => Some(TaskId::Process(*pid)),
        }
    }

    /// Starts the underlying thread or process.
    ///
    /// ### Errors
    /// - [`SupervisorError::AlreadyStarted`] on a second call;
    /// - [`SupervisorError::Spawn`] if the OS refuses the thread or process. The
    ///   handle then reports the failure as its exception, so a sweep reaps it.
    pub fn start(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock();
        let State::NotStarted(launch) = &*state else {
            return Err(SupervisorError::AlreadyStarted {
                task: self.name.clone(),
            });
        };

        let description = format!("{} {}()", self.name, self.target);
        let _ = self.description.set(description.clone());
        self.env.bus.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(self.name.as_str())
                .with_description(description.as_str()),
        );

        let spawned = match launch {
            Launch::Thread(task) => self.spawn_thread(Arc::clone(task), description.clone()),
            Launch::Process(cmd) => spawn_process(cmd, &description),
        };
        match spawned {
            Ok(next) => {
                *state = next;
                Ok(())
            }
            Err(e) => {
                *state = State::SpawnFailed;
                let message = e.to_string();
                self.outcome.record_exception(message.clone());
                self.outcome.finish();
                self.env.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(self.name.as_str())
                        .with_description(description.as_str())
                        .with_reason(message),
                );
                Err(e)
            }
        }
    }

    fn spawn_thread(&self, task: TaskRef, description: String) -> Result<State, SupervisorError> {
        let ctx = TaskContext::new(self.token.clone(), Arc::clone(&self.env.flags));
        let outcome = Arc::clone(&self.outcome);
        let bus = self.env.bus.clone();
        let name = self.name.clone();
        let label = description.clone();

        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_guarded(task.as_ref(), ctx, &outcome, &bus, &name, &description))
            .map_err(|source| SupervisorError::Spawn {
                target: label,
                source,
            })?;

        Ok(State::Thread {
            id: join.thread().id(),
            join: Some(join),
        })
    }

    /// Reaps an exited child without blocking. Caller holds the state lock.
    fn poll_locked(&self, state: &mut State) {
        let State::Process { pid, child, status } = state else {
            return;
        };
        if status.is_some() {
            return;
        }
        match child.try_wait() {
            Ok(Some(exit)) => {
                *status = Some(exit);
                self.on_process_exit(exit);
            }
            Ok(None) => {}
            Err(e) => debug!(task = %self.name, pid = *pid, error = %e, "try_wait failed"),
        }
    }

    fn on_process_exit(&self, exit: ExitStatus) {
        let description = self.description().unwrap_or(&self.name);
        if self.inspect_exit_status && !exit.success() {
            let message = format!("exited with {exit}");
            self.outcome.record_exception(message.clone());
            self.env.bus.publish(
                Event::new(EventKind::TaskFailed)
                    .with_task(self.name.as_str())
                    .with_description(description)
                    .with_reason(message),
            );
        } else {
            self.env.bus.publish(
                Event::new(EventKind::TaskFinished)
                    .with_task(self.name.as_str())
                    .with_description(description),
            );
        }
        self.outcome.finish();
    }

    /// True once started and until the thread/process has ended.
    pub fn is_alive(&self) -> bool {
        let mut state = self.state.lock();
        self.poll_locked(&mut state);
        match &*state {
            State::NotStarted(_) | State::SpawnFailed => false,
            State::Thread { join, .. } => join.as_ref().is_some_and(|j| !j.is_finished()),
            State::Process { status, .. } => status.is_none(),
        }
    }

    /// True once `start()` succeeded.
    pub fn is_started(&self) -> bool {
        matches!(
            &*self.state.lock(),
            State::Thread { .. } | State::Process { .. }
        )
    }

    /// True once the target returned (with or without an exception).
    pub fn is_finished(&self) -> bool {
        let mut state = self.state.lock();
        self.poll_locked(&mut state);
        self.outcome.finished.load(Ordering::SeqCst)
    }

    /// True iff the wrapped target failed (or could not be spawned). Never true
    /// before `start()`.
    pub fn has_raised_exception(&self) -> bool {
        let mut state = self.state.lock();
        self.poll_locked(&mut state);
        self.outcome.raised.load(Ordering::SeqCst)
    }

    /// Message of the recorded exception, if any.
    pub fn exception_message(&self) -> Option<String> {
        self.outcome.message.lock().clone()
    }

    /// True if this handle's thread is the calling thread.
    pub fn is_current_thread(&self) -> bool {
        matches!(&*self.state.lock(), State::Thread { id, .. } if *id == thread::current().id())
    }

    /// True once the OS-level join (or child reap) has completed.
    pub fn is_joined(&self) -> bool {
        match &*self.state.lock() {
            State::NotStarted(_) => false,
            State::SpawnFailed => true,
            State::Thread { join, .. } => join.is_none(),
            State::Process { status, .. } => status.is_some(),
        }
    }

    fn try_join(&self) -> JoinAttempt {
        let mut state = self.state.lock();
        self.poll_locked(&mut state);
        match &mut *state {
            State::NotStarted(_) => JoinAttempt::NotStarted,
            State::SpawnFailed => JoinAttempt::Joined,
            State::Thread { join, .. } => {
                if join.as_ref().is_some_and(|j| !j.is_finished()) {
                    return JoinAttempt::Running;
                }
                if let Some(j) = join.take() {
                    // The target runs under catch_unwind, so this cannot carry a panic.
                    let _ = j.join();
                }
                JoinAttempt::Joined
            }
            State::Process { status, .. } => {
                if status.is_some() {
                    JoinAttempt::Joined
                } else {
                    JoinAttempt::Running
                }
            }
        }
    }

    /// Waits up to `wait` for the thread/process to end and reaps it.
    ///
    /// Returns `true` if the handle is joined. A handle that was never started cannot
    /// be joined and returns `false` immediately.
    pub async fn join(&self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            match self.try_join() {
                JoinAttempt::Joined => return true,
                JoinAttempt::NotStarted => return false,
                JoinAttempt::Running => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            time::sleep((deadline - now).min(JOIN_POLL)).await;
        }
    }

    /// Requests termination of a running handle.
    ///
    /// - thread: cancels the handle's token; the target exits at its next check of
    ///   [`TaskContext::should_exit`]. A target that never checks keeps running.
    /// - process: sends `SIGKILL` to the child.
    ///
    /// ### Errors
    /// [`ForcedTerminationError::NotRunning`] if the handle is not started or already ended.
    pub fn terminate(&self) -> Result<(), ForcedTerminationError> {
        let not_running = || ForcedTerminationError::NotRunning {
            task: self.name.clone(),
        };

        let mut state = self.state.lock();
        self.poll_locked(&mut state);
        match &mut *state {
            State::NotStarted(_) | State::SpawnFailed => return Err(not_running()),
            State::Thread { join, .. } => {
                if !join.as_ref().is_some_and(|j| !j.is_finished()) {
                    return Err(not_running());
                }
                self.token.cancel();
            }
            State::Process { pid, child, status } => {
                if status.is_some() {
                    return Err(not_running());
                }
                if let Err(e) = child.kill() {
                    debug!(task = %self.name, pid = *pid, error = %e, "kill failed");
                    return Err(not_running());
                }
            }
        }
        drop(state);

        self.env
            .bus
            .publish(Event::new(EventKind::TaskTerminateRequested).with_task(self.name.as_str()));
        Ok(())
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("id", &self.id())
            .finish()
    }
}

fn spawn_process(cmd: &ProcessCommand, description: &str) -> Result<State, SupervisorError> {
    let child = cmd
        .to_std()
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            target: description.to_string(),
            source,
        })?;
    Ok(State::Process {
        pid: child.id(),
        child,
        status: None,
    })
}

/// Thread entry: runs the target inside the error boundary.
fn run_guarded(
    task: &dyn Task,
    ctx: TaskContext,
    outcome: &Outcome,
    bus: &Bus,
    name: &str,
    description: &str,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx)));
    let failure = match result {
        Ok(Err(e)) if e.is_failure() => Some(e.to_string()),
        Ok(_) => None,
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    match failure {
        Some(message) => {
            outcome.record_exception(message.clone());
            bus.publish(
                Event::new(EventKind::TaskFailed)
                    .with_task(name)
                    .with_description(description)
                    .with_reason(message),
            );
        }
        None => bus.publish(
            Event::new(EventKind::TaskFinished)
                .with_task(name)
                .with_description(description),
        ),
    }
    outcome.finish();
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tasks::TaskFn;
    use crate::error::TaskError;

    fn env() -> HandleEnv {
        HandleEnv {
            bus: Bus::new(64),
            flags: Arc::new(MemoryStore::new()),
            token: CancellationToken::new(),
        }
    }

    fn thread_handle<F>(name: &str, target: &'static str, f: F) -> TaskHandle
    where
        F: Fn(TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        TaskHandle::thread(name.to_string(), TaskFn::arc(target, f), env())
    }

    #[tokio::test]
    async fn not_started_handle_is_inert() {
        let h = thread_handle("Thread-1", "noop", |_| Ok(()));
        assert!(!h.has_raised_exception());
        assert!(!h.is_alive());
        assert!(!h.is_started());
        assert!(h.id().is_none());
        assert!(h.description().is_none());
        assert!(!h.join(Duration::from_millis(20)).await);
        assert_eq!(
            h.terminate(),
            Err(ForcedTerminationError::NotRunning {
                task: "Thread-1".into()
            })
        );
    }

    #[tokio::test]
    async fn description_is_set_on_start() {
        let h = thread_handle("Thread-2", "collect_stats", |_| Ok(()));
        h.start().unwrap();
        assert_eq!(h.description(), Some("Thread-2 collect_stats()"));
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(h.is_joined());
        assert!(h.is_finished());
        assert!(!h.has_raised_exception());
        assert!(matches!(h.id(), Some(TaskId::Thread(_))));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let h = thread_handle("Thread-3", "noop", |_| Ok(()));
        h.start().unwrap();
        assert!(matches!(
            h.start(),
            Err(SupervisorError::AlreadyStarted { .. })
        ));
        assert!(h.join(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn error_is_captured_not_propagated() {
        let h = thread_handle("Thread-4", "fetch", |_| Err(TaskError::fail("boom")));
        h.start().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(h.has_raised_exception());
        assert_eq!(h.exception_message().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let h = thread_handle("Thread-5", "explode", |_| panic!("kaboom"));
        h.start().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(h.has_raised_exception());
        assert_eq!(h.exception_message().as_deref(), Some("kaboom"));
    }

    #[tokio::test]
    async fn cancellation_is_a_clean_exit() {
        let h = thread_handle("Thread-6", "loop_forever", |ctx| {
            while !ctx.should_exit() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(TaskError::Canceled)
        });
        h.start().unwrap();
        assert!(h.is_alive());
        assert!(!h.join(Duration::from_millis(30)).await);

        h.terminate().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(!h.has_raised_exception());
        assert!(h.terminate().is_err());
    }

    #[tokio::test]
    async fn process_exit_status_is_ignored_by_default() {
        let cmd = ProcessCommand::from_argv(["sh", "-c", "exit 3"]).unwrap();
        let h = TaskHandle::process("Process-1".into(), cmd, env());
        h.start().unwrap();
        assert_eq!(h.description(), Some("Process-1 sh()"));
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(!h.has_raised_exception());
    }

    #[tokio::test]
    async fn process_exit_status_can_count_as_exception() {
        let cmd = ProcessCommand::from_argv(["sh", "-c", "exit 3"])
            .unwrap()
            .inspect_exit_status(true);
        let h = TaskHandle::process("Process-2".into(), cmd, env());
        h.start().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(h.has_raised_exception());
        assert!(h.exception_message().unwrap().starts_with("exited with"));
    }

    #[tokio::test]
    async fn process_terminate_kills_child() {
        let cmd = ProcessCommand::from_argv(["sleep", "30"]).unwrap();
        let h = TaskHandle::process("Process-3".into(), cmd, env());
        h.start().unwrap();
        assert!(h.is_alive());
        h.terminate().unwrap();
        assert!(h.join(Duration::from_secs(5)).await);
        assert!(!h.is_alive());
    }

    #[tokio::test]
    async fn spawn_failure_is_infrastructure_error() {
        let cmd = ProcessCommand::new("/nonexistent/procvisor-test-binary");
        let h = TaskHandle::process("Process-4".into(), cmd, env());
        assert!(matches!(h.start(), Err(SupervisorError::Spawn { .. })));
        assert!(!h.is_started());
        assert!(!h.is_alive());
        assert!(h.has_raised_exception());
        assert!(h.exception_message().unwrap().contains("procvisor-test-binary"));
        assert!(h.join(Duration::from_millis(20)).await);
        assert!(matches!(
            h.start(),
            Err(SupervisorError::AlreadyStarted { .. })
        ));
    }
}
