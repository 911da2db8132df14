//! # Worker launch seam.

use std::io;

use tokio::process::Child;

use crate::tasks::ProcessCommand;

/// Starts one worker process.
pub trait Launcher: Send + Sync + 'static {
    /// Spawns `cmd`; with `capture`, stdout and stderr are piped.
    fn launch(&self, cmd: &ProcessCommand, capture: bool) -> io::Result<Child>;
}

/// Spawns real processes through `tokio::process`.
///
/// Workers are killed if their `Child` is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLauncher;

impl Launcher for OsLauncher {
    fn launch(&self, cmd: &ProcessCommand, capture: bool) -> io::Result<Child> {
        let mut command = cmd.to_tokio(capture);
        command.kill_on_drop(true);
        command.spawn()
    }
}
