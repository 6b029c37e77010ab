//! weft: a lightweight parallel-task runtime
//!
//! A fixed-size work-stealing worker pool with blocking futures, scoped
//! fork-join, and a handful of divide-and-conquer kernels built on top:
//! factorial, reduction, sorting, an element-wise array kernel and matrix
//! multiplication.
//!
//! Two ways in:
//!
//! - an explicit [`Runtime`] handle, passed to the functions in [`parallel`];
//! - the process default, managed by [`start`] / [`stop`] and used by the
//!   top-level helpers ([`factorial`], [`reduce_sum`], ...).
//!
//! # Example
//!
//! ```rust
//! let sum = weft::reduce_sum(&[1, 2, 3, 4]).unwrap();
//! assert_eq!(sum, 10);
//! assert_eq!(weft::factorial(5).unwrap(), 120);
//! weft::stop();
//! ```
//!
//! # Crate Features
//!
//! - `python`: PyO3 extension module exposing the top-level helpers, with
//!   the GIL as the host lock

#![doc(html_root_url = "https://docs.rs/weft")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod parallel;
pub mod runtime;

// Utility modules
pub mod util;

#[cfg(feature = "python")]
mod python;

// Re-exports
pub use parallel::Matrix;
pub use runtime::{
    HostLock, Lifecycle, Result, Runtime, RuntimeError, RuntimeState, Scope, TaskFuture,
};
pub use util::config::{RuntimeConfig, SplitThresholds};

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

use crate::runtime::NoHostLock;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "weft";

/// Process default lifecycle.
static LIFECYCLE: Lazy<Lifecycle> = Lazy::new(Lifecycle::new);

/// Start the process default runtime, or return it if already running.
///
/// `workers` is honoured only by the call that actually starts the pool;
/// without it the worker count comes from `WEFT_NUM_THREADS`, then from the
/// hardware concurrency.
pub fn start(workers: Option<usize>) -> Result<Runtime> {
    LIFECYCLE.start(RuntimeConfig::resolve(workers))
}

/// Start the process default runtime from a full configuration.
pub fn start_with_config(config: RuntimeConfig) -> Result<Runtime> {
    LIFECYCLE.start(config)
}

/// Stop the process default runtime. Returns whether one was running.
pub fn stop() -> bool {
    LIFECYCLE.stop()
}

/// State of the process default runtime.
pub fn state() -> RuntimeState {
    LIFECYCLE.state()
}

/// The process default runtime, started on first use.
pub fn runtime() -> Result<Runtime> {
    start(None)
}

/// `n!` on the default runtime. See [`parallel::factorial`].
pub fn factorial(n: u64) -> Result<u64> {
    parallel::factorial(&runtime()?, n)
}

/// Sum of `data` on the default runtime. See [`parallel::reduce_sum`].
pub fn reduce_sum(data: &[i64]) -> Result<i64> {
    parallel::reduce_sum(&runtime()?, data)
}

/// Sorted copy of `data` on the default runtime. See [`parallel::sort`].
pub fn sort(data: &[i64]) -> Result<Vec<i64>> {
    parallel::sort(&runtime()?, data)
}

/// `a × b` on the default runtime. See [`parallel::matrix_multiply`].
pub fn matrix_multiply(
    a: &[Vec<i64>],
    b: &[Vec<i64>],
) -> Result<Matrix> {
    parallel::matrix_multiply(&runtime()?, a, b)
}

/// `r[i] = scalar * a[i] + b[i] * c[i]` on the default runtime.
pub fn elementwise(
    r: &mut [f64],
    a: &[f64],
    b: &[f64],
    c: &[f64],
    scalar: f64,
) -> Result<()> {
    parallel::elementwise_f64(&runtime()?, r, a, b, c, scalar)
}

/// Run `callback(arg)` on a worker of the default runtime and wait for it.
///
/// For a free-threaded caller. A caller holding a host lock uses
/// [`runtime::invoke_callback`] with its own [`HostLock`].
pub fn invoke_callback<F, R>(
    callback: F,
    arg: i64,
) -> Result<R>
where
    F: FnOnce(i64) -> R + Send + 'static,
    R: Send + 'static,
{
    debug!(arg, "invoke_callback");
    runtime::invoke_callback(&runtime()?, &Arc::new(NoHostLock), callback, arg)
}
