//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Result<(), TaskError>`. Arguments
//! are captured by the closure; use `Arc<...>` explicitly inside it for shared state.
//!
//! ## Example
//! ```rust
//! use procvisor::{TaskContext, TaskError, TaskFn, TaskRef};
//!
//! let node = String::from("LTE01");
//! let t: TaskRef = TaskFn::arc("sync_node", move |ctx: TaskContext| {
//!     if ctx.should_exit() {
//!         return Err(TaskError::Canceled);
//!     }
//!     let _ = &node;
//!     Ok(())
//! });
//!
//! assert_eq!(t.name(), "sync_node");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::{Task, TaskContext};

/// Function-backed task implementation.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F>
where
    F: Fn(TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFn").field("name", &self.name).finish()
    }
}

impl<F> Task for TaskFn<F>
where
    F: Fn(TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx)
    }
}
