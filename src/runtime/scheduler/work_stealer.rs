//! Work stealing for load balancing across worker threads.
//!
//! Each worker owns one [`TaskQueue`]. Idle workers steal from the other
//! queues starting at a random victim so that a single overloaded queue is
//! drained by everyone rather than by its neighbour only.

use rand::Rng;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::queue::TaskQueue;
use super::task::Task;

thread_local! {
    /// `(owner, index)` of the pool this thread works for, if any.
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// Statistics about work stealing operations.
#[derive(Debug, Default)]
pub struct StealStats {
    /// Number of successful steals.
    pub steal_successes: AtomicUsize,
    /// Number of failed steal attempts.
    pub steal_failures: AtomicUsize,
    /// Total tasks stolen.
    pub tasks_stolen: AtomicUsize,
}

impl StealStats {
    /// Record a successful steal.
    #[inline]
    pub fn record_success(
        &self,
        count: usize,
    ) {
        self.steal_successes.fetch_add(1, Ordering::Relaxed);
        self.tasks_stolen.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failed steal attempt.
    #[inline]
    pub fn record_failure(&self) {
        self.steal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total steal attempts.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.steal_successes.load(Ordering::Relaxed) + self.steal_failures.load(Ordering::Relaxed)
    }
}

/// Per-pool set of worker queues.
#[derive(Debug)]
pub struct WorkStealer {
    /// Identifier of the owning scheduler.
    owner: usize,
    /// All worker queues, indexed by worker.
    queues: Vec<TaskQueue>,
    /// Tasks currently sitting in any queue.
    queued: AtomicUsize,
    /// Statistics.
    stats: StealStats,
}

impl WorkStealer {
    /// Create a work stealer with one queue per worker.
    pub fn new(
        owner: usize,
        num_workers: usize,
    ) -> Self {
        Self {
            owner,
            queues: (0..num_workers).map(|_| TaskQueue::new()).collect(),
            queued: AtomicUsize::new(0),
            stats: StealStats::default(),
        }
    }

    /// Get the number of workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.queues.len()
    }

    /// Mark the calling thread as worker `index` of this pool.
    #[inline]
    pub fn register_worker(
        &self,
        index: usize,
    ) {
        CURRENT_WORKER.with(|current| current.set(Some((self.owner, index))));
    }

    /// Clear the calling thread's worker registration.
    #[inline]
    pub fn unregister_worker(&self) {
        CURRENT_WORKER.with(|current| current.set(None));
    }

    /// Index of the calling thread if it is a worker of this pool.
    #[inline]
    pub fn current_worker(&self) -> Option<usize> {
        match CURRENT_WORKER.with(Cell::get) {
            Some((owner, index)) if owner == self.owner => Some(index),
            _ => None,
        }
    }

    /// Push onto a worker's queue.
    #[inline]
    pub fn push(
        &self,
        index: usize,
        task: Task,
    ) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.queues[index % self.queues.len()].push(task);
    }

    /// Pop from the worker's own queue (newest first).
    #[inline]
    pub fn try_local(
        &self,
        index: usize,
    ) -> Option<Task> {
        let task = self.queues[index].pop_back();
        if task.is_some() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
        task
    }

    /// Steal up to `max_count` tasks from the first non-empty victim.
    ///
    /// Victims are visited starting at a random queue. `thief` is skipped
    /// when it names a worker of this pool.
    pub fn steal_batch(
        &self,
        thief: Option<usize>,
        max_count: usize,
    ) -> Vec<Task> {
        let num_workers = self.num_workers();
        if num_workers == 0 || self.queued() == 0 {
            return Vec::new();
        }

        let start = rand::rng().random_range(0..num_workers);
        for offset in 0..num_workers {
            let victim = (start + offset) % num_workers;
            if Some(victim) == thief {
                continue;
            }
            // Oldest first; pairs with the owner's LIFO pops.
            let stolen = self.queues[victim].steal_front(max_count);
            if !stolen.is_empty() {
                self.queued.fetch_sub(stolen.len(), Ordering::SeqCst);
                self.stats.record_success(stolen.len());
                return stolen;
            }
        }

        self.stats.record_failure();
        Vec::new()
    }

    /// Put surplus stolen tasks onto the thief's own queue.
    #[inline]
    pub fn requeue(
        &self,
        index: usize,
        tasks: Vec<Task>,
    ) {
        if tasks.is_empty() {
            return;
        }
        self.queued.fetch_add(tasks.len(), Ordering::SeqCst);
        self.queues[index].extend(tasks);
    }

    /// Tasks waiting in any queue.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Get steal statistics.
    #[inline]
    pub fn stats(&self) -> &StealStats {
        &self.stats
    }
}
