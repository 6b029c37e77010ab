//! Parallel factorial.

use std::ops::Range;
use tracing::debug;

use super::split_reduce;
use crate::runtime::{Result, Runtime, RuntimeError};

/// Largest `n` whose factorial fits in a `u64`.
pub const MAX_FACTORIAL_INPUT: u64 = 20;

fn check_input(n: u64) -> Result<()> {
    if n > MAX_FACTORIAL_INPUT {
        return Err(RuntimeError::Overflow(format!(
            "{}! does not fit in u64 (largest supported input is {})",
            n, MAX_FACTORIAL_INPUT
        )));
    }
    Ok(())
}

fn checked_product(range: Range<u64>) -> Result<u64> {
    range.fold(Ok(1u64), |acc, k| checked_mul(acc?, k))
}

fn checked_mul(
    a: u64,
    b: u64,
) -> Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| RuntimeError::Overflow(format!("{} * {} overflows u64", a, b)))
}

/// `n!` by recursive range splitting over `[1, n]`.
///
/// Sub-ranges of at most `thresholds.factorial` factors are multiplied
/// sequentially. Fails with [`RuntimeError::Overflow`] for `n > 20` before
/// any task is spawned.
///
/// # Example
///
/// ```rust
/// use weft::runtime::Runtime;
/// use weft::util::config::RuntimeConfig;
///
/// let runtime = Runtime::new(RuntimeConfig::default().with_workers(2)).unwrap();
/// assert_eq!(weft::parallel::factorial(&runtime, 5).unwrap(), 120);
/// ```
pub fn factorial(
    runtime: &Runtime,
    n: u64,
) -> Result<u64> {
    check_input(n)?;
    if n == 0 {
        return Ok(1);
    }

    let threshold = runtime.config().thresholds.factorial;
    debug!(n, threshold, "factorial");
    split_reduce(runtime, 1..n + 1, threshold, checked_product, checked_mul)
}

/// `n!` as a chain of nested tasks: each level spawns the next and waits on
/// it.
///
/// Produces the same value as [`factorial`]; it exists to exercise deep
/// nested waits.
pub fn factorial_chain(
    runtime: &Runtime,
    n: u64,
) -> Result<u64> {
    check_input(n)?;
    if n <= 1 {
        return Ok(1);
    }

    let child = runtime.clone();
    let below = runtime
        .try_spawn(move || factorial_chain(&child, n - 1))
        .wait()?;
    checked_mul(n, below)
}
