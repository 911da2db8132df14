//! # Task abstraction.
//!
//! This module defines the [`Task`] trait: a named, blocking unit of work that runs on
//! its own OS thread. The common handle type is [`TaskRef`], an `Arc<dyn Task>`
//! suitable for sharing across the runtime.
//!
//! A task receives a [`TaskContext`] and should periodically call
//! [`TaskContext::should_exit`] to stop cooperatively during shutdown. Threads cannot be
//! killed from outside; a target that never checks its context can only be waited on.

use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::TaskContext;

/// # Blocking, cancelable unit.
///
/// A `Task` has a stable [`name`](Task::name) (the "target name" shown in task
/// descriptions) and a blocking [`run`](Task::run) method.
///
/// # Example
/// ```
/// use procvisor::{Task, TaskContext, TaskError};
///
/// struct Poll;
///
/// impl Task for Poll {
///     fn name(&self) -> &str { "poll" }
///
///     fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
///         while !ctx.should_exit() {
///             // do one unit of work...
///             break;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable target name.
    fn name(&self) -> &str;

    /// Executes the task until completion or cancellation.
    ///
    /// Returning `Err` (or panicking) marks the owning handle as failed; the error is
    /// never propagated to whoever joins the handle.
    fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Task>;
