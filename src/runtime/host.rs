//! Interop with a host that serializes execution behind one lock.
//!
//! An embedding interpreter (a GIL-holding host, for instance) owns an
//! exclusive execution lock. Two rules keep it from deadlocking against the
//! pool:
//!
//! - a thread about to block on a future releases the host lock first
//!   ([`HostLock::unlocked`]);
//! - a worker about to run host code acquires it just around that call
//!   ([`HostLock::locked`]).
//!
//! [`invoke_callback`] applies both rules to run one host callback on a
//! worker.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

use crate::runtime::errors::Result;
use crate::runtime::Runtime;

/// The host's exclusive execution lock.
pub trait HostLock: Send + Sync + 'static {
    /// Run `f` with the lock released by the calling thread, then take it
    /// back. The caller must hold the lock.
    fn unlocked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send;

    /// Run `f` holding the lock, acquiring it for the duration of the call.
    fn locked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send;
}

/// A host without an exclusive lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHostLock;

impl HostLock for NoHostLock {
    #[inline]
    fn unlocked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        f()
    }

    #[inline]
    fn locked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        f()
    }
}

/// In-process exclusive execution lock with owner tracking.
///
/// Behaves like an interpreter lock: one thread holds it at a time, and it
/// is released and reacquired explicitly. Acquiring it from the thread that
/// already holds it is a no-op, so [`HostLock::locked`] is reentrant.
#[derive(Debug, Default)]
pub struct ExclusiveLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl ExclusiveLock {
    /// Create an unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the calling thread holds the lock.
    pub fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.is_some_and(|holder| holder != me) {
            self.released.wait(&mut owner);
        }
        *owner = Some(me);
    }

    /// Release the lock if the calling thread holds it.
    pub fn release(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            *owner = None;
            drop(owner);
            self.released.notify_one();
        }
    }

    /// Whether the calling thread holds the lock.
    pub fn held_by_current_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Whether any thread holds the lock.
    pub fn is_held(&self) -> bool {
        self.owner.lock().is_some()
    }
}

impl HostLock for ExclusiveLock {
    fn unlocked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if !self.held_by_current_thread() {
            return f();
        }
        self.release();
        let _reacquire = OnDrop(|| self.acquire());
        f()
    }

    fn locked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.held_by_current_thread() {
            return f();
        }
        self.acquire();
        // Released on unwind too.
        let _release = OnDrop(|| self.release());
        f()
    }
}

/// Runs a closure when dropped.
struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

/// Run a host callback on a worker and wait for its result.
///
/// The callback runs under `host.locked`; the caller waits under
/// `host.unlocked`, so a caller holding the host lock does not starve the
/// worker that needs it. A panic in the callback is reported as
/// [`RuntimeError::TaskFailure`](crate::runtime::RuntimeError::TaskFailure).
pub fn invoke_callback<H, F, R>(
    runtime: &Runtime,
    host: &Arc<H>,
    callback: F,
    arg: i64,
) -> Result<R>
where
    H: HostLock,
    F: FnOnce(i64) -> R + Send + 'static,
    R: Send + 'static,
{
    let worker_host = Arc::clone(host);
    let future = runtime.spawn(move || {
        trace!(arg, "entering host callback");
        worker_host.locked(move || callback(arg))
    });
    host.unlocked(move || future.wait())
}
