//! Error types used by the procvisor runtime and tasks.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`SupervisorError`]: infrastructure failures (pool allocation, daemon already
//!   running, PID-file writes, spawn failures). Always returned to the caller.
//! - [`TaskError`]: failures raised inside a task target. Captured on the
//!   [`TaskHandle`](crate::TaskHandle) and surfaced through polling, never re-raised.
//! - [`ForcedTerminationError`]: returned synchronously from termination requests.
//! - [`StoreError`]: failures of the shared key/value store.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logs.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::tasks::TaskId;

/// # Infrastructure errors produced by the supervisor.
///
/// These represent failures of the environment the tasks run in, not of the
/// tasks themselves, so callers can distinguish "infrastructure unavailable"
/// from "task failed".
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A live process already owns the daemon's PID file.
    #[error("daemon process {pid} (taken from file {pid_file:?}) appears to be already running")]
    DaemonAlreadyRunning {
        /// PID read from the PID file.
        pid: u32,
        /// Location of the PID file.
        pid_file: PathBuf,
    },

    /// Worker allocation failed even after retrying.
    #[error("worker pool unavailable after {attempts} attempts: {source}")]
    PoolUnavailable {
        /// Total number of attempts made.
        attempts: u32,
        /// Last allocation error.
        #[source]
        source: io::Error,
    },

    /// The PID file could not be written.
    #[error("cannot write pid file {path:?}: {source}")]
    PidFile {
        /// Location of the PID file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An OS thread or process could not be spawned.
    #[error("failed to spawn {target}: {source}")]
    Spawn {
        /// Description of what was being spawned.
        target: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `start()` was called on a handle that is already started.
    #[error("task {task} was already started")]
    AlreadyStarted {
        /// Task name.
        task: String,
    },

    /// A command with an empty argv was supplied.
    #[error("command for {name} is empty")]
    EmptyCommand {
        /// Owner of the command (daemon identifier or task name).
        name: String,
    },

    /// The shared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::SupervisorError;
    ///
    /// let err = SupervisorError::AlreadyStarted { task: "poller".into() };
    /// assert_eq!(err.as_label(), "task_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::DaemonAlreadyRunning { .. } => "daemon_already_running",
            SupervisorError::PoolUnavailable { .. } => "pool_unavailable",
            SupervisorError::PidFile { .. } => "pid_file",
            SupervisorError::Spawn { .. } => "spawn_failed",
            SupervisorError::AlreadyStarted { .. } => "task_already_started",
            SupervisorError::EmptyCommand { .. } => "empty_command",
            SupervisorError::Store(_) => "store",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by task execution.
///
/// A task target returns these to report failure. The supervisor records the
/// display text on the handle as its exception message.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution exceeded its timeout duration.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable fatal error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task execution failed.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and exited early.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Cancellation is a graceful exit, not a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, TaskError::Canceled)
    }
}

/// # Errors returned by forced termination requests.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForcedTerminationError {
    /// No running task matches; it never started or has already exited.
    #[error("task {task} is not running")]
    NotRunning {
        /// Task name or id that was looked up.
        task: String,
    },

    /// The id resolved to more than one live handle; nothing was cancelled.
    #[error("task id {id} matched {matched} live handles; refusing to terminate")]
    Ambiguous {
        /// The id that was looked up.
        id: TaskId,
        /// How many live handles carried it.
        matched: usize,
    },
}

impl ForcedTerminationError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ForcedTerminationError::NotRunning { .. } => "terminate_not_running",
            ForcedTerminationError::Ambiguous { .. } => "terminate_ambiguous",
        }
    }
}

/// # Errors produced by the shared key/value store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing storage I/O failed.
    #[error("store i/o on {path:?}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A value could not be (de)serialized.
    #[error("store codec for key {key}: {source}")]
    Codec {
        /// Key being processed.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "store_io",
            StoreError::Codec { .. } => "store_codec",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_message_is_preserved_verbatim() {
        let err = TaskError::fail("node sync timed out");
        assert_eq!(err.to_string(), "node sync timed out");
        assert_eq!(err.as_message(), "error: node sync timed out");
    }

    #[test]
    fn canceled_is_not_a_failure() {
        assert!(!TaskError::Canceled.is_failure());
        assert!(TaskError::fail("x").is_failure());
    }

    #[test]
    fn pool_unavailable_keeps_source() {
        let err = SupervisorError::PoolUnavailable {
            attempts: 3,
            source: io::Error::new(io::ErrorKind::WouldBlock, "EAGAIN"),
        };
        assert_eq!(err.as_label(), "pool_unavailable");
        assert!(std::error::Error::source(&err).is_some());
    }
}
