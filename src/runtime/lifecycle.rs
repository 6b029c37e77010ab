//! Start/stop protocol for a shared worker pool.
//!
//! A [`Lifecycle`] owns at most one running [`Runtime`]. Starting is a
//! two-phase protocol: a detached bootstrap thread builds the pool and fires
//! a one-shot [`ReadySignal`]; the starter waits on the matching
//! [`ReadyWaiter`] for at most `startup_timeout`.
//!
//! ```text
//! Stopped --start--> Starting --ready--> Running --stop--> Stopped
//!                        \--timeout/error--> Stopped
//! ```

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::runtime::errors::{Result, RuntimeError};
use crate::runtime::Runtime;
use crate::util::config::RuntimeConfig;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug)]
enum Slot {
    Stopped,
    Starting,
    Running(Runtime),
}

impl Slot {
    fn state(&self) -> RuntimeState {
        match self {
            Slot::Stopped => RuntimeState::Stopped,
            Slot::Starting => RuntimeState::Starting,
            Slot::Running(_) => RuntimeState::Running,
        }
    }
}

/// Sending half of the startup handshake. Consumed by [`ReadySignal::ready`]
/// so a launch can report at most once.
#[derive(Debug)]
pub struct ReadySignal {
    tx: Sender<Result<Runtime>>,
}

/// Receiving half of the startup handshake.
#[derive(Debug)]
pub struct ReadyWaiter {
    rx: Receiver<Result<Runtime>>,
}

/// Create a connected signal/waiter pair.
pub fn ready_channel() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = channel::bounded(1);
    (ReadySignal { tx }, ReadyWaiter { rx })
}

impl ReadySignal {
    /// Report the launch outcome. If nobody is waiting any more the freshly
    /// started pool is shut down instead of being leaked.
    pub fn ready(
        self,
        outcome: Result<Runtime>,
    ) {
        if let Err(unsent) = self.tx.send(outcome) {
            if let Ok(runtime) = unsent.into_inner() {
                warn!("runtime became ready after its starter gave up; shutting it down");
                runtime.shutdown();
            }
        }
    }
}

impl ReadyWaiter {
    /// Wait for the launch outcome.
    pub fn wait(
        self,
        timeout: Duration,
    ) -> Result<Runtime> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(RuntimeError::InitializationTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(RuntimeError::Bootstrap),
        }
    }
}

/// Start/stop coordinator for one shared runtime.
#[derive(Debug)]
pub struct Lifecycle {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a stopped lifecycle.
    pub const fn new() -> Self {
        Self {
            slot: parking_lot::const_mutex(Slot::Stopped),
            changed: Condvar::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> RuntimeState {
        self.slot.lock().state()
    }

    /// Start the pool if it is not running and return a handle to it.
    ///
    /// Idempotent: when already running the existing handle is returned and
    /// `config` is ignored. A concurrent caller waits for the start in
    /// progress instead of launching a second pool.
    pub fn start(
        &self,
        config: RuntimeConfig,
    ) -> Result<Runtime> {
        self.start_with(config, Runtime::new)
    }

    pub(crate) fn start_with<L>(
        &self,
        config: RuntimeConfig,
        launch: L,
    ) -> Result<Runtime>
    where
        L: FnOnce(RuntimeConfig) -> Result<Runtime> + Send + 'static,
    {
        let timeout = config.startup_timeout;
        let deadline = Instant::now() + timeout;

        let mut slot = self.slot.lock();
        loop {
            match &*slot {
                Slot::Running(runtime) => {
                    debug!("runtime already running");
                    return Ok(runtime.clone());
                },
                Slot::Starting => {
                    if self.changed.wait_until(&mut slot, deadline).timed_out()
                        && matches!(*slot, Slot::Starting)
                    {
                        return Err(RuntimeError::InitializationTimeout(timeout));
                    }
                },
                Slot::Stopped => break,
            }
        }
        *slot = Slot::Starting;
        drop(slot);

        let workers = config.num_workers;
        debug!(workers, ?timeout, "launching runtime");
        let (signal, waiter) = ready_channel();
        let bootstrap = thread::Builder::new()
            .name("weft-bootstrap".to_string())
            .spawn(move || signal.ready(launch(config)));

        let outcome = match bootstrap {
            Ok(_detached) => waiter.wait(timeout),
            Err(e) => Err(RuntimeError::WorkerSpawn(e.to_string())),
        };

        let mut slot = self.slot.lock();
        *slot = match &outcome {
            Ok(runtime) => {
                info!(workers = runtime.num_workers(), "runtime started");
                Slot::Running(runtime.clone())
            },
            Err(error) => {
                warn!(%error, "runtime failed to start");
                Slot::Stopped
            },
        };
        drop(slot);
        self.changed.notify_all();

        outcome
    }

    /// Stop the running pool: drain queued work and join the workers.
    ///
    /// Returns whether a pool was running. Stopping a stopped lifecycle only
    /// logs. A start in progress is left alone.
    pub fn stop(&self) -> bool {
        let mut slot = self.slot.lock();
        let runtime = match std::mem::replace(&mut *slot, Slot::Stopped) {
            Slot::Running(runtime) => runtime,
            other => {
                *slot = other;
                info!("stop requested but runtime is not running");
                return false;
            },
        };
        drop(slot);
        self.changed.notify_all();

        info!("shutting down runtime");
        runtime.shutdown();
        true
    }
}
