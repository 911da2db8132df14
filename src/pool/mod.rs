//! Bounded single-use worker processes.
//!
//! - [`BoundedWorkerPool`] create (with retry) → run once → always tear down
//! - [`PoolConfig`] retries, backoff, timeouts
//! - [`Launcher`] process spawn seam; [`OsLauncher`] is the real one
//! - [`ErrorSink`] receives worker failures; [`ErrorCollector`] keeps them

mod config;
mod launcher;
#[allow(clippy::module_inception)]
mod pool;
mod sink;

pub use config::PoolConfig;
pub use launcher::{Launcher, OsLauncher};
pub use pool::{BoundedWorkerPool, WorkerOutput};
pub use sink::{ErrorCollector, ErrorSink};
