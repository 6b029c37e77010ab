//! Blocking futures for spawned tasks.
//!
//! A [`TaskFuture`] is a handle to a slot that the task fills exactly once.
//! Waiting on it from a worker keeps that worker busy with other tasks;
//! waiting from any other thread parks on the slot's condition variable.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::errors::{Result, RuntimeError};
use crate::runtime::scheduler::{Scheduler, TaskId};

/// Observable state of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// The task has not finished.
    Pending,
    /// The task produced a value.
    Ready,
    /// The task panicked or returned an error.
    Failed,
}

#[derive(Debug)]
enum SlotState<T> {
    Pending,
    Ready(T),
    Failed(RuntimeError),
}

/// Single-assignment result cell shared by a task and its future.
#[derive(Debug)]
pub(crate) struct Slot<T> {
    state: Mutex<SlotState<T>>,
    filled: Condvar,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            filled: Condvar::new(),
        }
    }

    /// Store the task's outcome and wake every waiter.
    pub(crate) fn complete(
        &self,
        outcome: Result<T>,
    ) {
        let mut state = self.state.lock();
        debug_assert!(matches!(*state, SlotState::Pending), "slot completed twice");
        *state = match outcome {
            Ok(value) => SlotState::Ready(value),
            Err(error) => SlotState::Failed(error),
        };
        drop(state);
        self.filled.notify_all();
    }

    fn status(&self) -> FutureStatus {
        match *self.state.lock() {
            SlotState::Pending => FutureStatus::Pending,
            SlotState::Ready(_) => FutureStatus::Ready,
            SlotState::Failed(_) => FutureStatus::Failed,
        }
    }

    fn is_complete(&self) -> bool {
        self.status() != FutureStatus::Pending
    }

    /// Park until filled or `timeout` elapses.
    fn park(
        &self,
        timeout: Duration,
    ) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            self.filled.wait_for(&mut state, timeout);
        }
    }

    fn failure(&self) -> Option<RuntimeError> {
        match &*self.state.lock() {
            SlotState::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }
}

/// Handle to the pending or completed result of a spawned task.
#[derive(Debug)]
pub struct TaskFuture<T> {
    id: TaskId,
    slot: Arc<Slot<T>>,
    scheduler: Arc<Scheduler>,
}

impl<T> TaskFuture<T> {
    pub(crate) fn new(
        id: TaskId,
        slot: Arc<Slot<T>>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            id,
            slot,
            scheduler,
        }
    }

    /// ID of the task behind this future.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current state without blocking.
    #[inline]
    pub fn status(&self) -> FutureStatus {
        self.slot.status()
    }

    /// Whether the task has finished, successfully or not.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.slot.is_complete()
    }

    /// Block until the task has finished.
    pub fn block(&self) {
        let slot = &self.slot;
        self.scheduler
            .wait_until(|| slot.is_complete(), |timeout| slot.park(timeout));
    }

    /// Block until the task has finished and take its result.
    pub fn wait(self) -> Result<T> {
        self.block();
        let mut state = self.slot.state.lock();
        match std::mem::replace(&mut *state, SlotState::Pending) {
            SlotState::Ready(value) => Ok(value),
            SlotState::Failed(error) => Err(error),
            SlotState::Pending => unreachable!("future unblocked while pending"),
        }
    }
}

impl<T: Clone> TaskFuture<T> {
    /// Block until the task has finished and return a copy of its result.
    ///
    /// Repeated calls return the same value, or the same error if the task
    /// failed; the task is never run again.
    pub fn get(&self) -> Result<T> {
        self.block();
        match &*self.slot.state.lock() {
            SlotState::Ready(value) => Ok(value.clone()),
            SlotState::Failed(error) => Err(error.clone()),
            SlotState::Pending => unreachable!("future unblocked while pending"),
        }
    }
}

/// Block until every future is complete, or until any of them has failed.
///
/// The error returned is the first failure observed by a scan over the
/// futures in order; when several tasks fail concurrently which one is
/// reported is not deterministic.
pub fn wait_all<T>(futures: &[TaskFuture<T>]) -> Result<()> {
    let Some(first) = futures.first() else {
        return Ok(());
    };

    let scan = || -> Option<Result<()>> {
        let mut all_done = true;
        for future in futures {
            match future.slot.status() {
                FutureStatus::Failed => return future.slot.failure().map(Err),
                FutureStatus::Pending => all_done = false,
                FutureStatus::Ready => {},
            }
        }
        all_done.then_some(Ok(()))
    };

    let park = |timeout: Duration| {
        if let Some(pending) = futures.iter().find(|f| !f.slot.is_complete()) {
            pending.slot.park(timeout);
        }
    };

    first.scheduler.wait_until(|| scan().is_some(), park);
    scan().unwrap_or(Ok(()))
}
