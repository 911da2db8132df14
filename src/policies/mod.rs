//! Retry delay policies.
//!
//! - [`BackoffPolicy`] how the delay between worker creation attempts evolves
//! - [`JitterPolicy`] randomization applied on top of it
//!
//! Used by [`PoolConfig`](crate::PoolConfig); the default is a constant 10s with no
//! jitter.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
