//! In-process store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::Store;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Mutex-guarded in-memory store, shared by every handle of one supervisor.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// True if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(e) if !e.is_expired(Instant::now()) => return Some(e.value.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.remove(key);
        None
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CANCEL_FLAG_KEY, get_flag, set_flag, should_workers_exit};
    use serde_json::json;

    #[test]
    fn absent_flag_is_false() {
        let store = MemoryStore::new();
        assert!(!should_workers_exit(&store));
        assert!(!get_flag(&store, "anything"));
    }

    #[test]
    fn flag_round_trip_and_idempotent_set() {
        let store = MemoryStore::new();
        set_flag(&store, CANCEL_FLAG_KEY, true).unwrap();
        set_flag(&store, CANCEL_FLAG_KEY, true).unwrap();
        assert!(should_workers_exit(&store));
        set_flag(&store, CANCEL_FLAG_KEY, false).unwrap();
        assert!(!should_workers_exit(&store));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn non_bool_value_is_not_a_raised_flag() {
        let store = MemoryStore::new();
        store.set(CANCEL_FLAG_KEY, json!("yes"), None).unwrap();
        assert!(!should_workers_exit(&store));
    }

    #[test]
    fn entries_expire() {
        let store = MemoryStore::new();
        store
            .set("payload", json!({"a": 1}), Some(Duration::from_millis(10)))
            .unwrap();
        assert!(store.contains("payload"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.get("payload").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let store = MemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }
}
