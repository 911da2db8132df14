//! # Example: daemon_stop
//!
//! Demonstrates a PID-file daemon and its stop escalation.
//!
//! Shows how to:
//! - Start a background process with a PID file via [`Daemon::start`]
//! - Look it up again with [`Daemon::get_pid`] and [`Daemon::running`]
//! - Stop a process that ignores SIGINT; `stop()` escalates to SIGTERM
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Daemon::new("stubborn", sh -c "trap '' INT; sleep 30")
//!   ├─► start()           ─► {pid_dir}/stubborn.pid written
//!   ├─► running() == true
//!   └─► stop()
//!         ├─► 0ms    SIGINT   (ignored)
//!         ├─► 200ms  SIGTERM  ─► process exits
//!         └─► pid file removed
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example daemon_stop
//! ```

use std::time::{Duration, Instant};

use procvisor::{Daemon, DaemonConfig, ProcessCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== daemon_stop example ===\n");

    // 1. Daemon/pidfile modules log through tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .without_time()
        .init();

    // 2. PID files go to a scratch directory instead of /var/tmp
    let dir = tempfile::tempdir()?;
    let cmd = ProcessCommand::new("sh").args(["-c", "trap '' INT; sleep 30"]);
    let daemon = Daemon::new("stubborn", cmd, DaemonConfig::with_pid_dir(dir.path()))?;
    println!("daemon: {}", daemon.description());

    // 3. Start and inspect
    let pid = daemon.start()?;
    println!("started pid {pid}, pid file {}", daemon.pid_file().display());
    println!("running: {}", daemon.running());

    // A second start is refused while the first one lives
    if let Err(e) = daemon.start() {
        println!("second start refused: {e}");
    }

    // 4. Stop: SIGINT is ignored, the schedule moves on to SIGTERM
    tokio::time::sleep(Duration::from_millis(100)).await;
    let begun = Instant::now();
    daemon.stop().await;
    println!("\nstopped after {:?}", begun.elapsed());
    println!("running: {}", daemon.running());
    println!("pid file present: {}", daemon.pid_file().exists());
    Ok(())
}
