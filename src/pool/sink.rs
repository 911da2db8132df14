//! # Where worker failures go.
//!
//! `run_once` never returns a worker failure; it hands it to an [`ErrorSink`] owned
//! by the caller (a profile, a report, a test).

use parking_lot::Mutex;

use crate::error::TaskError;

/// Receives failures of pool workers.
pub trait ErrorSink: Send + Sync {
    /// Records one failure.
    fn record(&self, error: TaskError);
}

/// Sink that keeps every failure in memory.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<TaskError>>,
}

impl ErrorCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded failures, oldest first.
    pub fn errors(&self) -> Vec<TaskError> {
        self.errors.lock().clone()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl ErrorSink for ErrorCollector {
    fn record(&self, error: TaskError) {
        self.errors.lock().push(error);
    }
}
