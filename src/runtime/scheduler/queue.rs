//! Task queue for the scheduler
//!
//! Per-worker deque. The owning worker pushes and pops at the back; thieves
//! take from the front, so the oldest (usually largest) pieces of a recursive
//! split are the ones that migrate.

use parking_lot::Mutex;
use std::collections::VecDeque;

use super::task::Task;

/// A thread-safe task queue supporting multiple producers and consumers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    /// Inner deque protected by mutex
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// Create a new empty task queue.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Push a task to the back of the queue.
    #[inline]
    pub fn push(
        &self,
        task: Task,
    ) {
        self.inner.lock().push_back(task);
    }

    /// Push several tasks to the back of the queue.
    #[inline]
    pub fn extend(
        &self,
        tasks: impl IntoIterator<Item = Task>,
    ) {
        self.inner.lock().extend(tasks);
    }

    /// Pop the most recently pushed task (owner side).
    #[inline]
    pub fn pop_back(&self) -> Option<Task> {
        self.inner.lock().pop_back()
    }

    /// Take up to `max` of the oldest tasks in one lock acquisition.
    pub fn steal_front(
        &self,
        max: usize,
    ) -> Vec<Task> {
        let mut inner = self.inner.lock();
        let count = max.min(inner.len());
        inner.drain(..count).collect()
    }
}
