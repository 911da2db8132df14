//! Daemons: long-lived child processes with PID-file lifecycle and signal escalation.
//!
//! - [`Daemon`] start / stop / restart / running
//! - [`DaemonConfig`] PID directory, escalation table, stdio handling
//! - [`EscalationSchedule`] elapsed-time → [`Signal`] table used by `stop()`
//! - [`ProcessControl`] OS seam; [`OsProcessControl`] is the real one

mod config;
mod control;
#[allow(clippy::module_inception)]
mod daemon;
mod escalation;
mod pidfile;

pub use config::DaemonConfig;
pub use control::{OsProcessControl, ProcessControl};
pub(crate) use control::send_signal;
pub use daemon::Daemon;
pub use escalation::{EscalationSchedule, EscalationStep, Signal};
