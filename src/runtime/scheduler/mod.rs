//! Task scheduler for parallel execution
//!
//! This module provides the [`Scheduler`], a fixed-size pool of worker
//! threads with per-worker queues and work stealing. Blocking waits issued
//! from a worker keep executing other tasks, which is what lets recursive
//! divide-and-conquer code wait on its children without starving the pool.

pub mod queue;
pub mod task;
pub mod work_stealer;

pub use queue::TaskQueue;
pub use task::{Task, TaskId, TaskIdGenerator};
pub use work_stealer::{StealStats, WorkStealer};

use crossbeam::channel::Sender;
use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::runtime::errors::{Result, RuntimeError};
use crate::util::config::RuntimeConfig;

/// Upper bound on a single park of a thread that is not a worker. Completion
/// notifies the waiter directly, this only bounds a missed wakeup.
const EXTERNAL_PARK: Duration = Duration::from_millis(50);

/// Source of unique scheduler identifiers, used to tell pools apart in
/// worker thread-locals.
static NEXT_SCHEDULER_ID: AtomicUsize = AtomicUsize::new(1);

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Total tasks scheduled.
    pub tasks_scheduled: AtomicUsize,
    /// Total tasks completed.
    pub tasks_completed: AtomicUsize,
    /// Tasks whose body panicked or returned an error.
    pub tasks_failed: AtomicUsize,
    /// Tasks executed by a worker while it was waiting on a future.
    pub tasks_helped: AtomicUsize,
    /// Tasks run on the submitting thread because the pool had shut down.
    pub tasks_inlined: AtomicUsize,
}

impl SchedulerStats {
    /// Record a scheduled task.
    #[inline]
    pub fn record_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed task.
    #[inline]
    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed task.
    #[inline]
    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub num_workers: usize,
    pub tasks_scheduled: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_helped: usize,
    pub tasks_inlined: usize,
    pub tasks_stolen: usize,
    pub steal_attempts: usize,
    pub queued: usize,
}

/// Fixed-size work-stealing worker pool.
#[derive(Debug)]
pub struct Scheduler {
    /// Pool identifier.
    id: usize,
    /// Configuration.
    config: RuntimeConfig,
    /// Per-worker queues.
    work_stealer: WorkStealer,
    /// Round-robin cursor for submissions from outside the pool.
    next_queue: AtomicUsize,
    /// Task ID generator.
    task_ids: TaskIdGenerator,
    /// Set once shutdown begins; workers exit after draining.
    terminating: AtomicBool,
    /// Workers currently parked.
    sleepers: AtomicUsize,
    /// Lock paired with `wake`.
    sleep_lock: Mutex<()>,
    /// Condition variable for waking workers.
    wake: Condvar,
    /// Worker threads, taken on shutdown.
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    /// Statistics.
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create the pool and spawn its workers.
    ///
    /// Each worker sends its index on `ready` once it is registered and about
    /// to enter its loop.
    pub fn start(
        config: RuntimeConfig,
        ready: Sender<usize>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let id = NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed);
        let num_workers = config.num_workers;
        let scheduler = Arc::new(Self {
            id,
            work_stealer: WorkStealer::new(id, num_workers),
            config,
            next_queue: AtomicUsize::new(0),
            task_ids: TaskIdGenerator::new(),
            terminating: AtomicBool::new(false),
            sleepers: AtomicUsize::new(0),
            sleep_lock: Mutex::new(()),
            wake: Condvar::new(),
            workers: Mutex::new(Vec::with_capacity(num_workers)),
            stats: SchedulerStats::default(),
        });

        for index in 0..num_workers {
            let worker_scheduler = Arc::clone(&scheduler);
            let ready = ready.clone();
            let spawned = thread::Builder::new()
                .name(format!("weft-worker-{}", index))
                .stack_size(scheduler.config.stack_size)
                .spawn(move || worker_scheduler.worker_loop(index, ready));

            match spawned {
                Ok(handle) => scheduler.workers.lock().push(handle),
                Err(e) => {
                    warn!(worker = index, error = %e, "failed to spawn worker");
                    scheduler.shutdown();
                    return Err(RuntimeError::WorkerSpawn(e.to_string()));
                },
            }
        }

        debug!(scheduler = id, workers = num_workers, "worker pool spawned");
        Ok(scheduler)
    }

    /// Worker thread main loop.
    fn worker_loop(
        self: Arc<Self>,
        index: usize,
        ready: Sender<usize>,
    ) {
        self.work_stealer.register_worker(index);
        // The receiver may already be gone if startup timed out.
        let _ = ready.send(index);
        drop(ready);
        trace!(scheduler = self.id, worker = index, "worker online");

        loop {
            if let Some(task) = self.find_task(index) {
                self.execute(task);
                continue;
            }

            if self.terminating.load(Ordering::SeqCst) && self.work_stealer.queued() == 0 {
                break;
            }

            self.park(self.config.idle_timeout);
        }

        self.work_stealer.unregister_worker();
        trace!(scheduler = self.id, worker = index, "worker offline");
    }

    /// Next task for worker `index`: its own queue first, then a steal.
    fn find_task(
        &self,
        index: usize,
    ) -> Option<Task> {
        if let Some(task) = self.work_stealer.try_local(index) {
            return Some(task);
        }

        let mut stolen = self
            .work_stealer
            .steal_batch(Some(index), self.config.steal_batch)
            .into_iter();
        let first = stolen.next()?;
        self.work_stealer.requeue(index, stolen.collect());
        Some(first)
    }

    /// Execute a task.
    #[inline]
    fn execute(
        &self,
        task: Task,
    ) {
        trace!(task = %task.id(), "running");
        if !task.run() {
            self.stats.record_failed();
        }
        self.stats.record_completed();
    }

    /// Park the calling worker until woken or `timeout` elapses.
    fn park(
        &self,
        timeout: Duration,
    ) {
        let mut guard = self.sleep_lock.lock();
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        if self.work_stealer.queued() == 0 && !self.terminating.load(Ordering::SeqCst) {
            self.wake.wait_for(&mut guard, timeout);
        }
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wake one parked worker if any.
    #[inline]
    fn notify_one(&self) {
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.sleep_lock.lock();
            self.wake.notify_one();
        }
    }

    /// Allocate an ID for a task about to be submitted.
    #[inline]
    pub fn next_task_id(&self) -> TaskId {
        self.task_ids.next()
    }

    /// Submit a task.
    ///
    /// From a worker of this pool the task goes onto that worker's queue;
    /// from any other thread it is placed round-robin. After shutdown a task
    /// submitted from outside the pool runs on the calling thread so that
    /// whoever waits on it still gets an answer.
    pub fn submit(
        &self,
        task: Task,
    ) {
        self.stats.record_scheduled();
        let worker = self.work_stealer.current_worker();

        if worker.is_none() && self.terminating.load(Ordering::SeqCst) {
            debug!(task = %task.id(), "pool is shut down, running inline");
            self.stats.tasks_inlined.fetch_add(1, Ordering::Relaxed);
            self.execute(task);
            return;
        }

        let index = worker.unwrap_or_else(|| self.next_queue.fetch_add(1, Ordering::Relaxed));
        self.work_stealer.push(index, task);
        self.notify_one();

        // Shutdown may have raced with the push and every worker may already
        // be gone; make sure nothing is left behind.
        if worker.is_none() && self.terminating.load(Ordering::SeqCst) {
            self.drain_inline();
        }
    }

    /// Run every queued task on the calling thread.
    fn drain_inline(&self) {
        loop {
            let tasks = self.work_stealer.steal_batch(None, self.config.steal_batch);
            if tasks.is_empty() && self.work_stealer.queued() == 0 {
                break;
            }
            for task in tasks {
                self.stats.tasks_inlined.fetch_add(1, Ordering::Relaxed);
                self.execute(task);
            }
        }
    }

    /// Block until `done` returns true.
    ///
    /// On a worker of this pool the wait keeps executing queued tasks and
    /// only parks through `park` when nothing is runnable. Any other thread
    /// goes straight to `park`. `park` must return after a bounded time so
    /// that `done` is re-checked.
    pub fn wait_until<D, P>(
        &self,
        done: D,
        park: P,
    ) where
        D: Fn() -> bool,
        P: Fn(Duration),
    {
        let Some(index) = self.work_stealer.current_worker() else {
            while !done() {
                park(EXTERNAL_PARK);
            }
            return;
        };

        let backoff = Backoff::new();
        while !done() {
            if let Some(task) = self.find_task(index) {
                self.stats.tasks_helped.fetch_add(1, Ordering::Relaxed);
                self.execute(task);
                backoff.reset();
            } else if backoff.is_completed() {
                park(self.config.idle_timeout);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Whether the calling thread is a worker of this pool.
    #[inline]
    pub fn on_worker(&self) -> bool {
        self.work_stealer.current_worker().is_some()
    }

    /// Stop accepting work, let workers drain their queues and join them.
    ///
    /// Idempotent. When called from one of the pool's own workers nothing is
    /// joined: the caller may be running a task another worker is waiting
    /// on, so the workers are only signalled and exit once drained.
    pub fn shutdown(&self) {
        if !self.terminate() {
            return;
        }

        if self.on_worker() {
            debug!(scheduler = self.id, "shutdown requested from a worker, not joining");
            return;
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let joined = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                warn!(scheduler = self.id, "worker thread panicked");
            }
        }

        debug!(scheduler = self.id, joined, "worker pool shut down");
    }

    /// Begin shutdown without joining: workers are woken and exit once the
    /// queues are empty. Returns false if shutdown had already begun, in
    /// which case a later [`Scheduler::shutdown`] does not join either.
    pub fn terminate(&self) -> bool {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _guard = self.sleep_lock.lock();
        self.wake.notify_all();
        true
    }

    /// Whether shutdown has begun.
    #[inline]
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let steals = self.work_stealer.stats();
        StatsSnapshot {
            num_workers: self.num_workers(),
            tasks_scheduled: self.stats.tasks_scheduled.load(Ordering::Relaxed),
            tasks_completed: self.stats.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.stats.tasks_failed.load(Ordering::Relaxed),
            tasks_helped: self.stats.tasks_helped.load(Ordering::Relaxed),
            tasks_inlined: self.stats.tasks_inlined.load(Ordering::Relaxed),
            tasks_stolen: steals.tasks_stolen.load(Ordering::Relaxed),
            steal_attempts: steals.attempts(),
            queued: self.work_stealer.queued(),
        }
    }

    /// Get the number of workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.work_stealer.num_workers()
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests;
