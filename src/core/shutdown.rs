//! # OS shutdown signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives one of:
//! - unix: `SIGINT`, `SIGTERM`, `SIGQUIT`
//! - elsewhere: Ctrl-C
//!
//! It resolves to the name of the signal that arrived.

/// Waits for a termination signal and returns its name.
///
/// Each call installs independent listeners.
///
/// ### Errors
/// Fails if a listener cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for Ctrl-C and returns its name.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
