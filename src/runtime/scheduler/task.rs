//! Task definitions for the scheduler.
//!
//! A task is a boxed closure owned by the scheduler from submission until it
//! has run. The closure itself reports its outcome to whatever future or
//! scope is waiting on it, so running a task never fails.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl From<TaskId> for usize {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Type-erased work submitted to the pool. Returns `false` when the body
/// failed.
pub(crate) type Job = Box<dyn FnOnce() -> bool + Send + 'static>;

/// A unit of deferred work.
pub struct Task {
    /// Unique task ID.
    id: TaskId,
    /// The actual work to execute.
    job: Job,
}

impl std::fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

impl Task {
    /// Create a new task with the given ID and closure.
    pub fn new<F>(
        id: TaskId,
        job: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            job: Box::new(move || {
                job();
                true
            }),
        }
    }

    /// Wrap an already boxed job.
    #[inline]
    pub(crate) fn from_job(
        id: TaskId,
        job: Job,
    ) -> Self {
        Self { id, job }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Consume the task and run its closure, reporting whether it succeeded.
    #[inline]
    pub fn run(self) -> bool {
        (self.job)()
    }
}

/// Thread-safe generator for task IDs.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
        }
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
