//! # Daemon: a long-lived child process tracked through its PID file.
//!
//! ```text
//!            start()                     stop()
//! Unknown ──────────► Starting ──► Running ──────► Stopping ──► Stopped
//!    │  pid file names a live process                │ escalate signals
//!    └──► DaemonAlreadyRunning                       └─► pid file deleted (always)
//! ```
//!
//! The PID file is the only source of truth for "is it running"; any process that
//! knows the identifier (and PID directory) can stop a daemon another process started.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::daemon::{DaemonConfig, OsProcessControl, ProcessControl, pidfile};
use crate::error::SupervisorError;
use crate::payload::TaskPayload;
use crate::store::Store;
use crate::tasks::ProcessCommand;

static DAEMON_SEQ: AtomicUsize = AtomicUsize::new(1);

/// Rendered argv length from which the description only shows the program.
const LONG_ARGV: usize = 60;

/// Long-lived child process with a PID-file-backed lifecycle.
pub struct Daemon {
    identifier: String,
    name: String,
    description: String,
    command: ProcessCommand,
    pid_file: PathBuf,
    pid: Mutex<Option<u32>>,
    config: DaemonConfig,
    control: Arc<dyn ProcessControl>,
}

impl Daemon {
    /// Daemon running `command`, identified by `identifier`.
    ///
    /// `identifier` must be unique: it names the PID file.
    ///
    /// ### Errors
    /// [`SupervisorError::PidFile`] if the PID directory cannot be created.
    pub fn new(
        identifier: impl Into<String>,
        command: ProcessCommand,
        config: DaemonConfig,
    ) -> Result<Self, SupervisorError> {
        let rendered = command.render();
        let name = next_name();
        let description = if rendered.chars().count() < LONG_ARGV {
            format!("{name} [{rendered}]")
        } else {
            format!("{name} [{}]", command.program())
        };
        Self::assemble(identifier.into(), name, description, command, config)
    }

    /// Daemon from a raw argv.
    ///
    /// ### Errors
    /// [`SupervisorError::EmptyCommand`] for an empty argv, plus those of [`Daemon::new`].
    pub fn external<I, S>(
        identifier: impl Into<String>,
        argv: I,
        config: DaemonConfig,
    ) -> Result<Self, SupervisorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identifier = identifier.into();
        let command = ProcessCommand::from_argv(argv).ok_or_else(|| {
            SupervisorError::EmptyCommand {
                name: identifier.clone(),
            }
        })?;
        Self::new(identifier, command, config)
    }

    /// Daemon that runs a stored [`TaskPayload`] through `runner`.
    ///
    /// The payload is saved under `{identifier}_payload` first; the spawned argv is
    /// `[runner, identifier]`, and the runner is expected to load and dispatch it.
    ///
    /// ### Errors
    /// [`SupervisorError::Store`] if the payload cannot be saved, plus those of
    /// [`Daemon::new`].
    pub fn with_payload(
        identifier: impl Into<String>,
        runner: impl Into<String>,
        payload: &TaskPayload,
        store: &dyn Store,
        config: DaemonConfig,
    ) -> Result<Self, SupervisorError> {
        let identifier = identifier.into();
        payload.save(store, &identifier)?;
        debug!(identifier = %identifier, target = %payload.target, "stored daemon payload");

        let command = ProcessCommand::new(runner).arg(identifier.as_str());
        let name = next_name();
        let description = format!("{name} [{identifier}]");
        Self::assemble(identifier, name, description, command, config)
    }

    fn assemble(
        identifier: String,
        name: String,
        description: String,
        command: ProcessCommand,
        config: DaemonConfig,
    ) -> Result<Self, SupervisorError> {
        pidfile::ensure_dir(&config.pid_dir)?;
        Ok(Self {
            pid_file: pidfile::path_for(&config.pid_dir, &identifier),
            identifier,
            name,
            description,
            command,
            pid: Mutex::new(None),
            config,
            control: Arc::new(OsProcessControl::new()),
        })
    }

    /// Replaces the OS process seam.
    pub fn with_control(mut self, control: Arc<dyn ProcessControl>) -> Self {
        self.control = control;
        self
    }

    /// Unique identifier (PID file stem).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Display name, `Daemon-{n}`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display description, `"{name} [{argv}]"`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Command the daemon runs.
    pub fn command(&self) -> &ProcessCommand {
        &self.command
    }

    /// Location of the PID file.
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// PID on record: cached, otherwise read from the PID file.
    pub fn get_pid(&self) -> Option<u32> {
        let mut cached = self.pid.lock();
        if cached.is_none() {
            *cached = pidfile::read(&self.pid_file);
        }
        *cached
    }

    /// True if a PID is on record and that process is alive.
    pub fn running(&self) -> bool {
        self.get_pid().is_some_and(|pid| self.control.is_alive(pid))
    }

    fn raise_if_running(&self) -> Result<(), SupervisorError> {
        let pid = self.get_pid();
        debug!(daemon = %self.name, ?pid, "Checking if process is already running");
        match pid {
            Some(pid) if self.control.is_alive(pid) => Err(SupervisorError::DaemonAlreadyRunning {
                pid,
                pid_file: self.pid_file.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Spawns the daemon and records its PID.
    ///
    /// The process runs in its own process group; its stdio is closed when
    /// `close_all_fds` is set.
    ///
    /// ### Errors
    /// - [`SupervisorError::DaemonAlreadyRunning`] if the PID file names a live process
    ///   (nothing is spawned);
    /// - [`SupervisorError::Spawn`] if the process cannot be started;
    /// - [`SupervisorError::PidFile`] if the PID cannot be recorded.
    pub fn start(&self) -> Result<u32, SupervisorError> {
        self.raise_if_running()?;

        let mut cmd = self
            .command
            .clone()
            .new_process_group(true)
            .close_stdio(self.config.close_all_fds);
        if let Some(dir) = &self.config.cwd {
            cmd = cmd.current_dir(dir);
        }

        let pid = self
            .control
            .spawn(&cmd)
            .map_err(|source| SupervisorError::Spawn {
                target: self.description.clone(),
                source,
            })?;
        *self.pid.lock() = Some(pid);
        pidfile::write(&self.pid_file, pid)?;
        info!(daemon = %self.description, pid, "daemon started");
        Ok(pid)
    }

    /// Stops the daemon by escalating signals, then deletes the PID file.
    ///
    /// Signal failures are logged, never returned. The PID file is removed and the
    /// cached PID forgotten whether or not the process died.
    pub async fn stop(&self) {
        let Some(pid) = self.get_pid() else {
            error!(
                file = %self.pid_file.display(),
                "PID file does not exist; the daemon is not running"
            );
            return;
        };

        if self.escalate(pid).await {
            info!(daemon = %self.name, pid, "Successfully terminated");
        } else {
            warn!(daemon = %self.name, pid, "daemon still alive after signal escalation");
        }

        pidfile::remove(&self.pid_file);
        *self.pid.lock() = None;
    }

    /// Runs the escalation table against `pid`; returns whether it died.
    async fn escalate(&self, pid: u32) -> bool {
        let schedule = &self.config.escalation;
        let started = Instant::now();
        loop {
            if !self.control.is_alive(pid) {
                return true;
            }
            let elapsed = started.elapsed();
            if elapsed >= schedule.give_up_after() {
                return false;
            }
            if let Some(signal) = schedule.signal_at(elapsed) {
                if let Err(e) = self.control.signal(pid, signal) {
                    warn!(daemon = %self.name, pid, %signal, error = %e, "could not signal daemon");
                }
            }
            time::sleep(schedule.tick()).await;
        }
    }

    /// `stop()` followed by `start()`.
    pub async fn restart(&self) -> Result<u32, SupervisorError> {
        self.stop().await;
        self.start()
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("pid_file", &self.pid_file)
            .finish()
    }
}

fn next_name() -> String {
    format!("Daemon-{}", DAEMON_SEQ.fetch_add(1, Ordering::Relaxed))
}
