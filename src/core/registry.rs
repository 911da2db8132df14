//! # Registry of live task handles.
//!
//! An insertion-ordered list of `Arc<TaskHandle>` owned by one supervisor.
//!
//! ## Rules
//! - A handle is appended when the supervisor creates it, before it is started.
//! - A handle leaves only after a successful join (or a logged exception).
//! - No handle appears twice; identity is pointer identity of the `Arc`.
//! - Removing an absent handle is a no-op.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::tasks::{TaskHandle, TaskId};

/// Mutex-protected, insertion-ordered collection of handles.
#[derive(Default)]
pub struct Registry {
    handles: Mutex<Vec<Arc<TaskHandle>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handle unless it is already present.
    pub fn register(&self, handle: Arc<TaskHandle>) {
        let mut handles = self.handles.lock();
        if !handles.iter().any(|h| Arc::ptr_eq(h, &handle)) {
            handles.push(handle);
        }
    }

    /// Removes a handle; returns `true` if it was present.
    pub fn remove(&self, handle: &Arc<TaskHandle>) -> bool {
        let mut handles = self.handles.lock();
        let before = handles.len();
        handles.retain(|h| !Arc::ptr_eq(h, handle));
        handles.len() != before
    }

    /// True if the handle is present.
    pub fn contains(&self, handle: &Arc<TaskHandle>) -> bool {
        self.handles.lock().iter().any(|h| Arc::ptr_eq(h, handle))
    }

    /// Copy of the current contents, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<TaskHandle>> {
        self.handles.lock().clone()
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Live handles whose OS identity equals `id`.
    pub fn find_live(&self, id: TaskId) -> Vec<Arc<TaskHandle>> {
        self.snapshot()
            .into_iter()
            .filter(|h| h.id() == Some(id) && h.is_alive())
            .collect()
    }
}
