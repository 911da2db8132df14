//! # Process command (`ProcessCommand`)
//!
//! An argv vector plus the spawn options the supervisor cares about. Used by
//! process-backed [`TaskHandle`](crate::TaskHandle)s, by [`Daemon`](crate::Daemon) and by
//! [`BoundedWorkerPool`](crate::BoundedWorkerPool).
//!
//! ## Options
//! - `new_process_group`: detach the child into its own process group so terminal
//!   signals aimed at the supervisor do not reach it;
//! - `close_stdio`: connect stdin/stdout/stderr to `/dev/null` instead of inheriting;
//! - `inspect_exit_status`: treat a non-success exit as a task exception.

use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Argv and spawn options for a child process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessCommand {
    argv: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    new_process_group: bool,
    close_stdio: bool,
    inspect_exit_status: bool,
}

impl ProcessCommand {
    /// Creates a command running `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
            env: Vec::new(),
            current_dir: None,
            new_process_group: false,
            close_stdio: false,
            inspect_exit_status: false,
        }
    }

    /// Creates a command from a full argv; `None` when `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut it = argv.into_iter();
        let mut cmd = Self::new(it.next()?);
        cmd.argv.extend(it.map(Into::into));
        Some(cmd)
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the child's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Spawns the child in its own process group.
    pub fn new_process_group(mut self, yes: bool) -> Self {
        self.new_process_group = yes;
        self
    }

    /// Closes the child's stdio instead of inheriting the supervisor's.
    pub fn close_stdio(mut self, yes: bool) -> Self {
        self.close_stdio = yes;
        self
    }

    /// Counts a non-success exit status as a task exception.
    pub fn inspect_exit_status(mut self, yes: bool) -> Self {
        self.inspect_exit_status = yes;
        self
    }

    /// Full argv, program first.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The program (argv\[0\]).
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// File name of the program, used as the target name in descriptions.
    pub fn target_name(&self) -> &str {
        Path::new(self.program())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.program())
    }

    /// Whether a failing exit status is reported as an exception.
    pub fn inspects_exit_status(&self) -> bool {
        self.inspect_exit_status
    }

    /// Whether stdio is closed for the child.
    pub fn closes_stdio(&self) -> bool {
        self.close_stdio
    }

    /// Argv rendered as a list for logs.
    pub fn render(&self) -> String {
        format!("{:?}", self.argv)
    }

    /// Builds a blocking `std::process::Command`.
    pub(crate) fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(self.program());
        cmd.args(&self.argv[1..]);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        if self.close_stdio {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }
        #[cfg(unix)]
        if self.new_process_group {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    /// Builds an async `tokio::process::Command`.
    ///
    /// With `capture` set, stdout and stderr are piped back to the caller regardless of
    /// `close_stdio`.
    pub(crate) fn to_tokio(&self, capture: bool) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::from(self.to_std());
        if capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_rejects_empty() {
        assert!(ProcessCommand::from_argv(Vec::<String>::new()).is_none());
    }

    #[test]
    fn target_name_is_program_file_name() {
        let cmd = ProcessCommand::new("/opt/tools/bin/netsim").arg("--start");
        assert_eq!(cmd.target_name(), "netsim");
        assert_eq!(cmd.argv(), ["/opt/tools/bin/netsim", "--start"]);
    }

    #[test]
    fn builder_flags() {
        let cmd = ProcessCommand::from_argv(["sh", "-c", "exit 1"])
            .unwrap()
            .close_stdio(true)
            .inspect_exit_status(true);
        assert!(cmd.closes_stdio());
        assert!(cmd.inspects_exit_status());
        assert_eq!(cmd.render(), r#"["sh", "-c", "exit 1"]"#);
    }
}
