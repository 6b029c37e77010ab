//! Parallel reduction.
//!
//! The input is cut into one chunk per worker. Each chunk is folded from the
//! identity on its own task and the chunk results are combined left to right
//! on the calling thread, so an associative operator gives the same result
//! as a sequential fold.

use tracing::trace;

use crate::runtime::{Result, Runtime, RuntimeError};

/// Fold `data` with the associative operator `op`.
///
/// `identity` must be neutral for `op`; it seeds every chunk. Inputs of at
/// most `thresholds.reduce_grain` elements are folded inline.
pub fn reduce<T, F>(
    runtime: &Runtime,
    data: &[T],
    identity: T,
    op: F,
) -> Result<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> T + Sync,
{
    map_reduce(runtime, data, identity, T::clone, op)
}

/// Map every element with `map` and fold the results with `op`.
pub fn map_reduce<I, T, M, F>(
    runtime: &Runtime,
    data: &[I],
    identity: T,
    map: M,
    op: F,
) -> Result<T>
where
    I: Sync,
    T: Clone + Send + Sync + 'static,
    M: Fn(&I) -> T + Sync,
    F: Fn(T, T) -> T + Sync,
{
    let fold = |chunk: &[I]| chunk.iter().fold(identity.clone(), |acc, x| op(acc, map(x)));
    let fold = &fold;

    if data.len() <= runtime.config().thresholds.reduce_grain {
        return Ok(fold(data));
    }

    let chunk_len = data.len().div_ceil(runtime.num_workers().max(1));
    trace!(len = data.len(), chunk_len, "parallel reduce");

    runtime.scope(|s| {
        let partials: Vec<_> = data
            .chunks(chunk_len)
            .map(|chunk| s.spawn(move || fold(chunk)))
            .collect();

        let mut acc = identity.clone();
        for partial in partials {
            acc = op(acc, partial.wait()?);
        }
        Ok(acc)
    })
}

/// Sum of `data`.
///
/// The total is accumulated in `i128`, so intermediate sums never wrap; the
/// call fails with [`RuntimeError::Overflow`] only when the exact total does
/// not fit in an `i64`.
pub fn reduce_sum(
    runtime: &Runtime,
    data: &[i64],
) -> Result<i64> {
    let total = map_reduce(runtime, data, 0i128, |&x| i128::from(x), |a, b| a + b)?;
    i64::try_from(total)
        .map_err(|_| RuntimeError::Overflow(format!("sum {} does not fit in i64", total)))
}
