//! Scoped spawning: tasks that borrow from the caller's stack.

use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::future::{Slot, TaskFuture};
use crate::runtime::scheduler::task::Job;
use crate::runtime::scheduler::Task;
use crate::runtime::{capture, Runtime};

/// Completion counter for the tasks of one scope.
#[derive(Debug, Default)]
struct ScopeState {
    pending: AtomicUsize,
    lock: Mutex<()>,
    done: Condvar,
}

impl ScopeState {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.lock.lock();
            self.done.notify_all();
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    fn park(
        &self,
        timeout: Duration,
    ) {
        let mut guard = self.lock.lock();
        if !self.is_idle() {
            self.done.wait_for(&mut guard, timeout);
        }
    }
}

/// A set of tasks that may borrow data living at least as long as `'scope`.
///
/// Created by [`Runtime::scope`]; every task spawned here has finished by
/// the time `scope` returns.
pub struct Scope<'scope> {
    runtime: Runtime,
    state: Arc<ScopeState>,
    // Invariant in 'scope.
    marker: PhantomData<fn(&'scope ()) -> &'scope ()>,
}

impl<'scope> Scope<'scope> {
    pub(crate) fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            state: Arc::new(ScopeState::default()),
            marker: PhantomData,
        }
    }

    /// Spawn a task that may borrow from the enclosing scope.
    pub fn spawn<F, T>(
        &self,
        body: F,
    ) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'static,
    {
        self.try_spawn(move || Ok(body()))
    }

    /// Spawn a fallible borrowing task; an `Err` is captured on the future.
    pub fn try_spawn<F, T>(
        &self,
        body: F,
    ) -> TaskFuture<T>
    where
        F: FnOnce() -> crate::runtime::Result<T> + Send + 'scope,
        T: Send + 'static,
    {
        let scheduler = self.runtime.scheduler();
        let id = scheduler.next_task_id();
        let slot = Arc::new(Slot::new());
        let completion = Arc::clone(&slot);
        let state = Arc::clone(&self.state);

        let job: Box<dyn FnOnce() -> bool + Send + 'scope> = Box::new(move || {
            let outcome = capture(id, body);
            let succeeded = outcome.is_ok();
            completion.complete(outcome);
            state.finish_one();
            succeeded
        });
        // SAFETY: `Runtime::scope` does not return before `pending` drops to
        // zero, and `pending` is decremented only after `body` has been
        // consumed, so nothing borrowed for 'scope is touched after the
        // borrow ends.
        let job: Job = unsafe {
            std::mem::transmute::<Box<dyn FnOnce() -> bool + Send + 'scope>, Job>(job)
        };

        self.state.pending.fetch_add(1, Ordering::AcqRel);
        scheduler.submit(Task::from_job(id, job));
        TaskFuture::new(id, slot, Arc::clone(scheduler))
    }

    /// Number of tasks of this scope still running or queued.
    #[inline]
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// The runtime this scope schedules on.
    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Block until every task spawned so far has finished.
    fn wait_idle(&self) {
        let state = &self.state;
        self.runtime
            .scheduler()
            .wait_until(|| state.is_idle(), |timeout| state.park(timeout));
    }
}

/// Run `op` with a fresh scope and wait for all of its tasks, even if `op`
/// panics.
pub(crate) fn run_scope<'scope, OP, R>(
    runtime: &Runtime,
    op: OP,
) -> R
where
    OP: FnOnce(&Scope<'scope>) -> R,
{
    let scope = Scope::new(runtime.clone());
    let result = panic::catch_unwind(AssertUnwindSafe(|| op(&scope)));
    scope.wait_idle();
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}
