//! # Task abstractions and handles.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for implementing blocking, cancelable thread targets
//! - [`TaskFn`] - function-based task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`ProcessCommand`] - argv (plus spawn options) for process-backed work
//! - [`TaskContext`] - what a running target sees: its cancellation token and the shared flags
//! - [`TaskHandle`] - supervisory wrapper around one running thread or process

mod command;
mod context;
mod handle;
mod task;
mod task_fn;

pub use command::ProcessCommand;
pub use context::TaskContext;
pub use handle::{TaskHandle, TaskId, TaskKind};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;

pub(crate) use handle::{HandleEnv, panic_message};
