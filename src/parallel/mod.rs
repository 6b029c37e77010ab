//! Parallel algorithms
//!
//! Divide-and-conquer kernels built on the [`Runtime`] task API. Every
//! algorithm splits its input until a piece falls under the matching cutoff
//! in [`SplitThresholds`](crate::util::config::SplitThresholds) and then runs
//! that piece sequentially.

pub mod elementwise;
pub mod factorial;
pub mod matrix;
pub mod reduce;
pub mod sort;

pub use elementwise::{elementwise, elementwise_f64};
pub use factorial::{factorial, factorial_chain};
pub use matrix::{matrix_multiply, Matrix};
pub use reduce::{map_reduce, reduce, reduce_sum};
pub use sort::sort;

use std::ops::Range;

use crate::runtime::{Result, Runtime};

/// Recursively reduce the range `[start, end)`.
///
/// A range of at most `threshold` elements is handed to `leaf`. A larger one
/// is split at its midpoint, both halves are spawned and their results are
/// merged with `combine` once both have resolved. A threshold of zero is
/// treated as one.
pub fn split_reduce<T, L, C>(
    runtime: &Runtime,
    range: Range<u64>,
    threshold: u64,
    leaf: L,
    combine: C,
) -> Result<T>
where
    T: Send + 'static,
    L: Fn(Range<u64>) -> Result<T> + Sync,
    C: Fn(T, T) -> Result<T> + Sync,
{
    split_range(runtime, range, threshold.max(1), &leaf, &combine)
}

fn split_range<T, L, C>(
    runtime: &Runtime,
    range: Range<u64>,
    threshold: u64,
    leaf: &L,
    combine: &C,
) -> Result<T>
where
    T: Send + 'static,
    L: Fn(Range<u64>) -> Result<T> + Sync,
    C: Fn(T, T) -> Result<T> + Sync,
{
    if range.end.saturating_sub(range.start) <= threshold {
        return leaf(range);
    }

    let mid = range.start + (range.end - range.start) / 2;
    runtime.scope(|s| {
        let left = s.try_spawn(|| split_range(runtime, range.start..mid, threshold, leaf, combine));
        let right = s.try_spawn(|| split_range(runtime, mid..range.end, threshold, leaf, combine));
        let left = left.wait()?;
        let right = right.wait()?;
        combine(left, right)
    })
}

/// Apply `f` to disjoint chunks of `data` in parallel.
///
/// The slice is halved recursively until a piece is at most `grain` long;
/// `f` receives each piece together with its offset into `data`.
pub fn for_each_chunk_mut<T, F>(
    runtime: &Runtime,
    data: &mut [T],
    grain: usize,
    f: F,
) -> Result<()>
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    split_chunks(runtime, data, 0, grain.max(1), &f)
}

fn split_chunks<T, F>(
    runtime: &Runtime,
    data: &mut [T],
    offset: usize,
    grain: usize,
    f: &F,
) -> Result<()>
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    if data.len() <= grain {
        f(offset, data);
        return Ok(());
    }

    let mid = data.len() / 2;
    let (head, tail) = data.split_at_mut(mid);
    let (left, right) = runtime.join(
        || split_chunks(runtime, head, offset, grain, f),
        || split_chunks(runtime, tail, offset + mid, grain, f),
    )?;
    left.and(right)
}
