//! # OS seam for daemon processes.
//!
//! [`ProcessControl`] spawns, checks and signals processes by PID. [`OsProcessControl`]
//! is the real implementation; tests substitute their own.

use std::collections::HashMap;
use std::io;
use std::process::Child;

use parking_lot::Mutex;
use tracing::debug;

use crate::daemon::Signal;
use crate::tasks::ProcessCommand;

/// Spawning and signalling of processes addressed by PID.
pub trait ProcessControl: Send + Sync + 'static {
    /// Spawns `cmd` and returns its PID.
    fn spawn(&self, cmd: &ProcessCommand) -> io::Result<u32>;

    /// True if a process with `pid` exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Sends `signal` to `pid`.
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()>;
}

/// Real processes via `std::process` and `kill(2)`.
///
/// Children spawned through this instance are kept so that they can be reaped once
/// they exit; otherwise a zombie would still answer `kill(pid, 0)`.
#[derive(Default)]
pub struct OsProcessControl {
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    /// Creates a controller with no tracked children.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn(&self, cmd: &ProcessCommand) -> io::Result<u32> {
        let child = cmd.to_std().spawn()?;
        let pid = child.id();
        self.children.lock().insert(pid, child);
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        {
            let mut children = self.children.lock();
            if let Some(child) = children.get_mut(&pid) {
                match child.try_wait() {
                    Ok(None) => return true,
                    Ok(Some(status)) => {
                        debug!(pid, %status, "reaped daemon child");
                        children.remove(&pid);
                        return false;
                    }
                    Err(e) => debug!(pid, error = %e, "try_wait failed; probing pid"),
                }
            }
        }
        pid_exists(pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        send_signal(pid, signal)
    }
}

/// `kill(pid, signal)` for a positive pid.
pub(crate) fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let pid = match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 0 => pid,
        _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid out of range")),
    };
    // SAFETY: kill(2) has no memory effects.
    let rc = unsafe { libc::kill(pid, signal.as_raw()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// `kill(pid, 0)`: success or `EPERM` means the process exists.
fn pid_exists(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 only checks for existence.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_exists(std::process::id()));
        assert!(!pid_exists(0));
        assert!(!pid_exists(u32::MAX));
    }

    #[test]
    fn spawn_signal_and_reap() {
        let ctl = OsProcessControl::new();
        let pid = ctl.spawn(&ProcessCommand::new("sleep").arg("30")).unwrap();
        assert!(ctl.is_alive(pid));

        ctl.signal(pid, Signal::Term).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while ctl.is_alive(pid) {
            assert!(Instant::now() < deadline, "child did not exit");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(ctl.children.lock().is_empty());
    }
}
