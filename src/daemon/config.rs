//! # Daemon configuration.

use std::path::PathBuf;

use crate::daemon::EscalationSchedule;

/// Where PID files live and how daemons are spawned and stopped.
///
/// ## Field semantics
/// - `pid_dir`: directory of `{identifier}.pid` files, created (mode 0777) on first use
/// - `escalation`: signal table used by `stop()`
/// - `close_all_fds`: spawn with stdin/stdout/stderr on `/dev/null`
/// - `cwd`: working directory of the daemon (`None` = inherit)
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    /// Directory holding the PID files.
    pub pid_dir: PathBuf,
    /// Stop escalation table.
    pub escalation: EscalationSchedule,
    /// Detach the daemon's standard streams.
    pub close_all_fds: bool,
    /// Working directory for the spawned process.
    pub cwd: Option<PathBuf>,
}

impl DaemonConfig {
    /// Default configuration with another PID directory.
    pub fn with_pid_dir(pid_dir: impl Into<PathBuf>) -> Self {
        Self {
            pid_dir: pid_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for DaemonConfig {
    /// - `pid_dir = /var/tmp/procvisor/daemon`
    /// - `escalation = EscalationSchedule::default()` (16 × 100ms)
    /// - `close_all_fds = true`
    /// - `cwd = None`
    fn default() -> Self {
        Self {
            pid_dir: PathBuf::from("/var/tmp/procvisor/daemon"),
            escalation: EscalationSchedule::default(),
            close_all_fds: true,
            cwd: None,
        }
    }
}
