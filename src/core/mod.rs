//! Supervisor core: registry, join coordination and cooperative shutdown.
//!
//! Internal modules:
//! - [`registry`]: insertion-ordered set of live handles;
//! - [`join`]: `join_sweep` / `wait_for_all`;
//! - [`supervisor`]: owns the registry and the cancellation flag;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod join;
mod registry;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use registry::Registry;
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::Supervisor;
