//! Runtime system
//!
//! This module contains the worker pool, its lifecycle and the task API
//! built on top of it: futures, scoped tasks and fork-join.
//!
//! # Example
//!
//! ```rust
//! use weft::runtime::Runtime;
//! use weft::util::config::RuntimeConfig;
//!
//! let runtime = Runtime::new(RuntimeConfig::default().with_workers(2)).unwrap();
//! let answer = runtime.spawn(|| 6 * 7);
//! assert_eq!(answer.get().unwrap(), 42);
//! ```

pub mod errors;
pub mod future;
pub mod host;
pub mod lifecycle;
pub mod scheduler;
pub mod scope;

pub use errors::{Result, RuntimeError};
pub use future::{wait_all, FutureStatus, TaskFuture};
pub use host::{invoke_callback, ExclusiveLock, HostLock, NoHostLock};
pub use lifecycle::{Lifecycle, RuntimeState};
pub use scheduler::{Scheduler, StatsSnapshot, TaskId};
pub use scope::Scope;

use crossbeam::channel;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::runtime::errors::panic_message;
use crate::runtime::future::Slot;
use crate::runtime::scheduler::Task;
use crate::util::config::RuntimeConfig;

/// Shared handle to a running worker pool.
///
/// Cloning is cheap. The pool is shut down (drained and joined) when the
/// last handle is dropped or [`Runtime::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

#[derive(Debug)]
struct RuntimeInner {
    scheduler: Arc<Scheduler>,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

impl Runtime {
    /// Start a pool and wait until every worker is running.
    ///
    /// Fails with [`RuntimeError::InitializationTimeout`] if the workers do
    /// not all report in within `config.startup_timeout`. The late workers
    /// are signalled to exit but not joined.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let started = Instant::now();
        let num_workers = config.num_workers;
        let timeout = config.startup_timeout;
        let (ready_tx, ready_rx) = channel::bounded(num_workers.max(1));

        let scheduler = Scheduler::start(config, ready_tx)?;
        let runtime = Self {
            inner: Arc::new(RuntimeInner { scheduler }),
        };

        for _ in 0..num_workers {
            let remaining = timeout.saturating_sub(started.elapsed());
            if ready_rx.recv_timeout(remaining).is_err() {
                // Slow workers are left to exit on their own; dropping the
                // handle must not wait for them.
                runtime.scheduler().terminate();
                debug!(workers = num_workers, ?timeout, "workers missed the startup deadline");
                return Err(RuntimeError::InitializationTimeout(timeout));
            }
        }

        debug!(
            workers = num_workers,
            elapsed_us = started.elapsed().as_micros() as u64,
            "runtime ready"
        );
        Ok(runtime)
    }

    /// Submit `body` for asynchronous execution.
    ///
    /// A panic inside `body` is captured and reported by the future as
    /// [`RuntimeError::TaskFailure`].
    pub fn spawn<F, T>(
        &self,
        body: F,
    ) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.try_spawn(move || Ok(body()))
    }

    /// Submit a fallible body; an `Err` is captured on the future unchanged.
    pub fn try_spawn<F, T>(
        &self,
        body: F,
    ) -> TaskFuture<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let scheduler = self.scheduler();
        let id = scheduler.next_task_id();
        let slot = Arc::new(Slot::new());
        let completion = Arc::clone(&slot);

        scheduler.submit(Task::from_job(
            id,
            Box::new(move || {
                let outcome = capture(id, body);
                let succeeded = outcome.is_ok();
                completion.complete(outcome);
                succeeded
            }),
        ));

        TaskFuture::new(id, slot, Arc::clone(scheduler))
    }

    /// Run tasks that may borrow from the caller; returns once all of them
    /// have finished.
    pub fn scope<'scope, OP, R>(
        &self,
        op: OP,
    ) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R,
    {
        scope::run_scope(self, op)
    }

    /// Run `a` on the calling thread and `b` as a task, potentially in
    /// parallel, and return both results.
    ///
    /// If `b` fails its error is returned; a panic in `a` propagates after
    /// `b` has finished.
    pub fn join<A, B, RA, RB>(
        &self,
        a: A,
        b: B,
    ) -> Result<(RA, RB)>
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send + 'static,
    {
        self.scope(|s| {
            let right = s.spawn(b);
            let left = a();
            right.wait().map(|right| (left, right))
        })
    }

    /// Number of workers in the pool.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.inner.scheduler.num_workers()
    }

    /// Configuration the pool was started with.
    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        self.inner.scheduler.config()
    }

    /// Whether the calling thread is one of this pool's workers.
    #[inline]
    pub fn on_worker(&self) -> bool {
        self.inner.scheduler.on_worker()
    }

    /// Copy of the scheduler counters.
    #[inline]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.scheduler.snapshot()
    }

    /// Whether shutdown has begun.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.inner.scheduler.is_terminating()
    }

    /// Drain queued work and stop the workers. Other handles stay valid;
    /// work submitted afterwards from outside the pool runs inline.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }

    #[inline]
    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.inner.scheduler
    }
}

/// Run a task body, turning a panic into [`RuntimeError::TaskFailure`].
pub(crate) fn capture<F, T>(
    id: TaskId,
    body: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(RuntimeError::TaskFailure {
            task: id,
            message: panic_message(payload.as_ref()),
        }),
    }
}

#[cfg(test)]
mod tests;
