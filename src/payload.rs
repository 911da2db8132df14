//! # Task payloads handed to separately launched runner processes.
//!
//! A [`TaskPayload`] names a target and its arguments. It is stored as JSON under
//! `{identifier}_payload` for 30 minutes, so a runner started as
//! `runner {identifier}` can load it and hand it to a [`Dispatcher`].
//!
//! ```rust
//! use procvisor::{Dispatcher, MemoryStore, TaskPayload};
//!
//! let store = MemoryStore::new();
//! TaskPayload::new("greet").arg("world").save(&store, "job-1").unwrap();
//!
//! let dispatcher = Dispatcher::new().register("greet", |args, _kwargs| {
//!     assert_eq!(args[0], "world");
//!     Ok(())
//! });
//! dispatcher.run_stored(&store, "job-1").unwrap();
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{StoreError, TaskError};
use crate::store::Store;

/// Lifetime of a stored payload.
pub const PAYLOAD_TTL: Duration = Duration::from_secs(30 * 60);

/// Store key of the payload for `identifier`.
pub fn payload_key(identifier: &str) -> String {
    format!("{identifier}_payload")
}

/// Target name plus positional and keyword arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Name the dispatcher resolves.
    pub target: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskPayload {
    /// Payload with no arguments.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Stores the payload for `identifier` with [`PAYLOAD_TTL`].
    pub fn save(&self, store: &dyn Store, identifier: &str) -> Result<(), StoreError> {
        let key = payload_key(identifier);
        let value = serde_json::to_value(self).map_err(|source| StoreError::Codec {
            key: key.clone(),
            source,
        })?;
        store.set(&key, value, Some(PAYLOAD_TTL))
    }

    /// Loads the payload for `identifier`; `None` when absent, expired or malformed.
    pub fn load(store: &dyn Store, identifier: &str) -> Option<Self> {
        let key = payload_key(identifier);
        let value = store.get(&key)?;
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(key = %key, error = %e, "ignoring malformed payload");
                None
            }
        }
    }
}

type Handler = Arc<dyn Fn(&[Value], &Map<String, Value>) -> Result<(), TaskError> + Send + Sync>;

/// Maps target names to functions.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    /// Empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `target`, replacing any previous handler.
    pub fn register<F>(mut self, target: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.handlers.insert(target.into(), Arc::new(f));
        self
    }

    /// True if `target` has a handler.
    pub fn knows(&self, target: &str) -> bool {
        self.handlers.contains_key(target)
    }

    /// Runs the handler for `payload.target`.
    ///
    /// ### Errors
    /// [`TaskError::Fatal`] for an unknown target; otherwise whatever the handler returns.
    pub fn dispatch(&self, payload: &TaskPayload) -> Result<(), TaskError> {
        let handler = self
            .handlers
            .get(&payload.target)
            .ok_or_else(|| TaskError::Fatal {
                error: format!("unknown target {}", payload.target),
            })?;
        handler(&payload.args, &payload.kwargs)
    }

    /// Loads the payload stored for `identifier` and dispatches it.
    ///
    /// ### Errors
    /// [`TaskError::Fatal`] when nothing is stored; otherwise as [`dispatch`](Self::dispatch).
    pub fn run_stored(&self, store: &dyn Store, identifier: &str) -> Result<(), TaskError> {
        let payload = TaskPayload::load(store, identifier).ok_or_else(|| TaskError::Fatal {
            error: format!("no payload stored for {identifier}"),
        })?;
        self.dispatch(&payload)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<_> = self.handlers.keys().collect();
        targets.sort();
        f.debug_struct("Dispatcher").field("targets", &targets).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn stored_under_identifier_key() {
        let store = MemoryStore::new();
        let p = TaskPayload::new("sync").arg(1).kwarg("force", true);
        p.save(&store, "profile_a").unwrap();

        assert!(store.contains("profile_a_payload"));
        assert_eq!(TaskPayload::load(&store, "profile_a"), Some(p));
        assert_eq!(TaskPayload::load(&store, "profile_b"), None);
    }

    #[test]
    fn malformed_payload_is_absent() {
        let store = MemoryStore::new();
        store.set("x_payload", json!({"nope": 1}), None).unwrap();
        assert_eq!(TaskPayload::load(&store, "x"), None);
    }

    #[test]
    fn missing_argument_lists_default_to_empty() {
        let p: TaskPayload = serde_json::from_value(json!({"target": "t"})).unwrap();
        assert!(p.args.is_empty() && p.kwargs.is_empty());
    }

    #[test]
    fn dispatch_routes_arguments() {
        let total = Arc::new(AtomicI64::new(0));
        let t = Arc::clone(&total);
        let d = Dispatcher::new().register("add", move |args, kwargs| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            let scale = kwargs.get("scale").and_then(Value::as_i64).unwrap_or(1);
            t.store(sum * scale, Ordering::SeqCst);
            Ok(())
        });

        let p = TaskPayload::new("add").arg(2).arg(3).kwarg("scale", 10);
        d.dispatch(&p).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 50);
        assert!(d.knows("add"));
    }

    #[test]
    fn unknown_target_and_missing_payload_are_fatal() {
        let d = Dispatcher::new();
        let err = d.dispatch(&TaskPayload::new("ghost")).unwrap_err();
        assert_eq!(err.as_label(), "task_fatal");

        let store = MemoryStore::new();
        assert!(matches!(
            d.run_stored(&store, "nothing"),
            Err(TaskError::Fatal { .. })
        ));
    }
}
