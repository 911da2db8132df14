//! # Shared key/value store for flags and payloads.
//!
//! The supervisor's cooperative-cancellation flag lives in a [`Store`] rather than in a
//! global. Two implementations are provided:
//! - [`MemoryStore`]: process-wide, guarded by a mutex;
//! - [`FileStore`]: one JSON file per key in a directory, so separately launched
//!   processes (daemons, pool workers) can observe the same flags and payloads.
//!
//! ## Rules
//! - Values are [`serde_json::Value`]s with an optional time-to-live.
//! - Reads are tolerant: a missing, expired or unreadable entry reads as absent.
//! - A flag that was never set reads as `false` (absence is not cancellation).

mod file;
mod memory;

use std::time::Duration;

use serde_json::Value;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key of the cooperative-cancellation flag polled by workers.
pub const CANCEL_FLAG_KEY: &str = "should-workers-exit";

/// Key/value store with optional expiry.
pub trait Store: Send + Sync + 'static {
    /// Returns the live value for `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`; `ttl = None` keeps it until explicitly replaced.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// True if a live value exists for `key`.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Reads a boolean flag; anything but a stored `true` reads as `false`.
pub fn get_flag(store: &dyn Store, key: &str) -> bool {
    matches!(store.get(key), Some(Value::Bool(true)))
}

/// Sets a boolean flag with no expiry.
pub fn set_flag(store: &dyn Store, key: &str, value: bool) -> Result<(), StoreError> {
    store.set(key, Value::Bool(value), None)
}

/// Worker-facing read of the cancellation flag.
pub fn should_workers_exit(store: &dyn Store) -> bool {
    get_flag(store, CANCEL_FLAG_KEY)
}
