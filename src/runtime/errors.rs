//! Runtime errors

use std::time::Duration;
use thiserror::Error;

use crate::runtime::scheduler::TaskId;

/// Runtime result
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Runtime errors
///
/// Errors are `Clone` so that a failed future can hand the same error to
/// every caller of [`TaskFuture::get`](crate::runtime::TaskFuture::get).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("runtime initialization timed out after {0:?}")]
    InitializationTimeout(Duration),

    #[error("runtime bootstrap thread exited before signalling readiness")]
    Bootstrap,

    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("dimension mismatch in {operation}: {left} vs {right}")]
    DimensionMismatch {
        /// Operation that rejected its input
        operation: &'static str,
        /// Size on the left-hand side of the comparison
        left: usize,
        /// Size on the right-hand side of the comparison
        right: usize,
    },

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("{task} failed: {message}")]
    TaskFailure {
        /// Task whose body panicked
        task: TaskId,
        /// Panic payload rendered as text
        message: String,
    },
}

impl RuntimeError {
    /// Shorthand for a [`RuntimeError::DimensionMismatch`].
    #[inline]
    pub fn dimension_mismatch(
        operation: &'static str,
        left: usize,
        right: usize,
    ) -> Self {
        RuntimeError::DimensionMismatch {
            operation,
            left,
            right,
        }
    }

    /// Whether this error was produced by a panicking task body.
    #[inline]
    pub fn is_task_failure(&self) -> bool {
        matches!(self, RuntimeError::TaskFailure { .. })
    }
}

/// Render a panic payload captured by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}
