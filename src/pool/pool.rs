//! # BoundedWorkerPool: one worker, one task, hard timeout, guaranteed cleanup.
//!
//! ```text
//! run_once(cmd, fetch_result = true)
//!   create_pool ── launch ──✗──► sleep(backoff) ──► launch ... ──✗──► PoolUnavailable
//!        │ ok
//!        ▼
//!   wait output ≤ timeout ──► success      → Some(output)
//!                         └─► exit≠0 / io / timeout → sink.record(..), None
//!   always: kill + reap
//!
//! run_once(cmd, fetch_result = false)
//!   launch once ──► wait ≤ timeout ──► SIGTERM ──► poll exit every 1s (× 60)
//! ```

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::time;
use tracing::{debug, warn};

use crate::daemon::{Signal, send_signal};
use crate::error::{SupervisorError, TaskError};
use crate::pool::{ErrorSink, Launcher, OsLauncher, PoolConfig};
use crate::tasks::ProcessCommand;

/// Everything a finished worker produced.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    /// Exit status of the worker.
    pub status: ExitStatus,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl WorkerOutput {
    /// Standard output decoded lossily as UTF-8.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Single-worker, single-use process runner.
pub struct BoundedWorkerPool {
    config: PoolConfig,
    launcher: Arc<dyn Launcher>,
}

impl BoundedWorkerPool {
    /// Pool launching real processes.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            launcher: Arc::new(OsLauncher),
        }
    }

    /// Replaces the launch seam.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Allocates a worker running `cmd`, retrying with backoff.
    ///
    /// ### Errors
    /// [`SupervisorError::PoolUnavailable`] once `retries + 1` attempts failed.
    pub async fn create_pool(
        &self,
        cmd: &ProcessCommand,
        capture: bool,
    ) -> Result<Child, SupervisorError> {
        let mut attempt: u32 = 0;
        loop {
            match self.launcher.launch(cmd, capture) {
                Ok(child) => {
                    debug!(cmd = %cmd.render(), pid = ?child.id(), "worker created");
                    return Ok(child);
                }
                Err(e) if attempt < self.config.retries => {
                    let delay = self.config.backoff.next(attempt);
                    debug!(attempt, error = %e, ?delay, "Failed to create worker; retrying");
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    warn!(
                        attempts = attempt + 1,
                        waited = ?self.config.backoff.total(attempt),
                        error = %source,
                        "Failed to create worker; giving up"
                    );
                    return Err(SupervisorError::PoolUnavailable {
                        attempts: attempt + 1,
                        source,
                    });
                }
            }
        }
    }

    /// Runs `cmd` once in a fresh worker.
    ///
    /// With `fetch_result`, waits up to `timeout` (default `run_timeout`) for the
    /// worker's output and returns it on success. Worker failures (non-zero exit, I/O,
    /// timeout) go to `sink` and yield `Ok(None)`. Without `fetch_result`, the worker
    /// is waited for, terminated, and `Ok(None)` is returned.
    ///
    /// ### Errors
    /// [`SupervisorError::PoolUnavailable`] if no worker could be created for a fetch.
    pub async fn run_once(
        &self,
        cmd: &ProcessCommand,
        fetch_result: bool,
        timeout: Option<Duration>,
        sink: Option<&dyn ErrorSink>,
    ) -> Result<Option<WorkerOutput>, SupervisorError> {
        let timeout = timeout.unwrap_or(self.config.run_timeout);
        if fetch_result {
            self.fetch(cmd, timeout, sink).await
        } else {
            self.run_detached(cmd, timeout, sink).await;
            Ok(None)
        }
    }

    async fn fetch(
        &self,
        cmd: &ProcessCommand,
        timeout: Duration,
        sink: Option<&dyn ErrorSink>,
    ) -> Result<Option<WorkerOutput>, SupervisorError> {
        let mut child = self.create_pool(cmd, true).await?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let waited = time::timeout(timeout, async {
            let (stdout, stderr, status) =
                tokio::try_join!(read_all(stdout), read_all(stderr), child.wait())?;
            Ok::<_, std::io::Error>(WorkerOutput {
                status,
                stdout,
                stderr,
            })
        })
        .await;

        let output = match waited {
            Ok(Ok(out)) if out.status.success() => Some(out),
            Ok(Ok(out)) => {
                report(sink, TaskError::fail(format!("worker exited with {}", out.status)));
                None
            }
            Ok(Err(e)) => {
                report(sink, TaskError::Fatal { error: e.to_string() });
                None
            }
            Err(_) => {
                report(sink, TaskError::Timeout { timeout });
                None
            }
        };

        debug!(pid = ?child.id(), "tearing down worker");
        if let Ok(None) = child.try_wait() {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "worker kill failed");
            }
        }
        if let Err(e) = child.wait().await {
            debug!(error = %e, "worker reap failed");
        }
        Ok(output)
    }

    async fn run_detached(
        &self,
        cmd: &ProcessCommand,
        timeout: Duration,
        sink: Option<&dyn ErrorSink>,
    ) {
        let mut child = match self.launcher.launch(cmd, false) {
            Ok(child) => child,
            Err(e) => {
                report(sink, TaskError::Fatal { error: e.to_string() });
                return;
            }
        };
        debug!(pid = ?child.id(), ?timeout, "Calling join on worker process");

        match time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "worker process exited");
                return;
            }
            Ok(Err(e)) => report(sink, TaskError::Fatal { error: e.to_string() }),
            Err(_) => report(sink, TaskError::Timeout { timeout }),
        }
        self.terminate_and_wait(&mut child).await;
    }

    /// SIGTERM, then poll for exit; gives up after `exit_poll_attempts`.
    async fn terminate_and_wait(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            if let Err(e) = send_signal(pid, Signal::Term) {
                debug!(pid, error = %e, "could not terminate worker");
            }
        }

        for attempt in 0..self.config.exit_poll_attempts {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "worker process exited after terminate");
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "try_wait failed");
                    return;
                }
            }
            if attempt < 5 || attempt % 10 == 0 {
                debug!(attempt, "Waiting for worker process to exit");
            }
            time::sleep(self.config.exit_poll_interval).await;
        }
        warn!(
            pid = ?child.id(),
            attempts = self.config.exit_poll_attempts,
            "worker process still alive; giving up waiting"
        );
    }
}

fn report(sink: Option<&dyn ErrorSink>, error: TaskError) {
    debug!(error = %error, "worker failed");
    if let Some(sink) = sink {
        sink.record(error);
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ErrorCollector;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails the first `failures` launches, then launches for real.
    struct FlakyLauncher {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyLauncher {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Launcher for FlakyLauncher {
        fn launch(&self, cmd: &ProcessCommand, capture: bool) -> io::Result<Child> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(io::Error::other("resource temporarily unavailable"));
            }
            // Real child from here on: let the clock follow wall time again.
            time::resume();
            OsLauncher.launch(cmd, capture)
        }
    }

    fn fast_config() -> PoolConfig {
        PoolConfig {
            exit_poll_interval: Duration::from_millis(20),
            ..PoolConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn creation_retries_with_backoff_then_succeeds() {
        let launcher = Arc::new(FlakyLauncher::new(2));
        let pool = BoundedWorkerPool::new(PoolConfig::default()).with_launcher(launcher.clone());

        let begun = Instant::now();
        let out = pool
            .run_once(&ProcessCommand::new("echo").arg("done"), true, None, None)
            .await
            .unwrap()
            .unwrap();

        assert!(begun.elapsed() >= Duration::from_secs(20));
        assert_eq!(launcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(out.stdout_lossy().trim(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn creation_gives_up_after_retries() {
        let launcher = Arc::new(FlakyLauncher::new(u32::MAX));
        let pool = BoundedWorkerPool::new(PoolConfig::default()).with_launcher(launcher.clone());

        let begun = Instant::now();
        let err = pool
            .create_pool(&ProcessCommand::new("true"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::PoolUnavailable { attempts: 3, .. }));
        assert_eq!(begun.elapsed(), Duration::from_secs(20));
        assert_eq!(begun.elapsed(), pool.config.backoff.total(pool.config.retries));
        assert_eq!(launcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_worker_goes_to_sink() {
        let pool = BoundedWorkerPool::new(fast_config());
        let sink = ErrorCollector::new();
        let cmd = ProcessCommand::from_argv(["sh", "-c", "echo oops >&2; exit 4"]).unwrap();

        let out = pool.run_once(&cmd, true, None, Some(&sink)).await.unwrap();
        assert!(out.is_none());
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("worker exited with"));
    }

    #[tokio::test]
    async fn fetch_timeout_is_recorded_and_worker_torn_down() {
        let pool = BoundedWorkerPool::new(fast_config());
        let sink = ErrorCollector::new();
        let cmd = ProcessCommand::new("sleep").arg("30");

        let begun = std::time::Instant::now();
        let out = pool
            .run_once(&cmd, true, Some(Duration::from_millis(200)), Some(&sink))
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(begun.elapsed() < Duration::from_secs(10));
        assert!(matches!(sink.errors().as_slice(), [TaskError::Timeout { .. }]));
    }

    #[tokio::test]
    async fn detached_run_terminates_overdue_worker() {
        let pool = BoundedWorkerPool::new(fast_config());
        let sink = ErrorCollector::new();
        let cmd = ProcessCommand::new("sleep").arg("30");

        let begun = std::time::Instant::now();
        let out = pool
            .run_once(&cmd, false, Some(Duration::from_millis(100)), Some(&sink))
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(begun.elapsed() < Duration::from_secs(10));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn detached_run_of_quick_worker_records_nothing() {
        let pool = BoundedWorkerPool::new(fast_config());
        let sink = ErrorCollector::new();
        pool.run_once(&ProcessCommand::new("true"), false, None, Some(&sink))
            .await
            .unwrap();
        assert!(sink.is_empty());
    }
}
