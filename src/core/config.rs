//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the timing and capacity settings used by the
//! [`Supervisor`](crate::Supervisor) and its join coordinator.
//!
//! ## Sentinel values
//! - `join_timeout = 0s` → `wait_for_all` performs exactly one sweep
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::time::Duration;

/// Timing and capacity settings for a supervisor.
///
/// ## Field semantics
/// - `join_timeout`: overall budget of [`wait_for_all`](crate::Supervisor::wait_for_all)
///   and of `terminate_all(true)`
/// - `sweep_join_wait`: per-handle join wait inside one sweep
/// - `poll_interval`: sleep between two sweeps
/// - `best_effort_join`: per-handle join wait of `terminate_all(false)`
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Overall wait budget for joining every registered handle.
    pub join_timeout: Duration,

    /// Maximum wait for one finished handle to be joined during a sweep.
    pub sweep_join_wait: Duration,

    /// Sleep between consecutive sweeps of `wait_for_all`.
    pub poll_interval: Duration,

    /// Join wait per live handle when `terminate_all` does not wait for completion.
    pub best_effort_join: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` messages skip
    /// older items.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `join_timeout = 360s`
    /// - `sweep_join_wait = 200ms`
    /// - `poll_interval = 100ms`
    /// - `best_effort_join = 10ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(360),
            sweep_join_wait: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
            best_effort_join: Duration::from_millis(10),
            bus_capacity: 1024,
        }
    }
}
