//! # Worker pool configuration.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Settings of [`BoundedWorkerPool`](crate::BoundedWorkerPool).
///
/// ## Field semantics
/// - `retries`: extra creation attempts after the first failure (`0` = no retry)
/// - `backoff`: delay before each retry
/// - `run_timeout`: default wait for a worker to finish
/// - `exit_poll_interval` / `exit_poll_attempts`: how a terminated worker is
///   waited for before giving up
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Retries after a failed worker creation.
    pub retries: u32,
    /// Delay between creation attempts.
    pub backoff: BackoffPolicy,
    /// Default bound on one run.
    pub run_timeout: Duration,
    /// Sleep between exit checks of a terminated worker.
    pub exit_poll_interval: Duration,
    /// Number of exit checks before giving up.
    pub exit_poll_attempts: u32,
}

impl Default for PoolConfig {
    /// - `retries = 2`
    /// - `backoff = 10s` constant, no jitter
    /// - `run_timeout = 30min`
    /// - `exit_poll_interval = 1s`, `exit_poll_attempts = 60`
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: BackoffPolicy::default(),
            run_timeout: Duration::from_secs(30 * 60),
            exit_poll_interval: Duration::from_secs(1),
            exit_poll_attempts: 60,
        }
    }
}
