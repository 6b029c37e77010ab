//! Element-wise array kernel: `r[i] = scalar * a[i] + b[i] * c[i]`.
//!
//! Output chunks are disjoint `&mut` sub-slices, so tasks write without any
//! locking.

use std::ops::{Add, Mul};
use tracing::debug;

use super::for_each_chunk_mut;
use crate::runtime::{Result, Runtime, RuntimeError};

/// Compute `r[i] = scalar * a[i] + b[i] * c[i]` for every `i`.
///
/// All four buffers must have the same length; otherwise
/// [`RuntimeError::DimensionMismatch`] is returned and `r` is left untouched.
pub fn elementwise<T>(
    runtime: &Runtime,
    r: &mut [T],
    a: &[T],
    b: &[T],
    c: &[T],
    scalar: T,
) -> Result<()>
where
    T: Copy + Send + Sync + Mul<Output = T> + Add<Output = T>,
{
    for (name, len) in [("a", a.len()), ("b", b.len()), ("c", c.len())] {
        if len != r.len() {
            debug!(input = name, len, expected = r.len(), "elementwise length mismatch");
            return Err(RuntimeError::dimension_mismatch("elementwise", r.len(), len));
        }
    }

    let grain = runtime.config().thresholds.elementwise_grain;
    for_each_chunk_mut(runtime, r, grain, |offset, chunk| {
        let end = offset + chunk.len();
        let inputs = a[offset..end].iter().zip(&b[offset..end]).zip(&c[offset..end]);
        for (out, ((&x, &y), &z)) in chunk.iter_mut().zip(inputs) {
            *out = scalar * x + y * z;
        }
    })
}

/// [`elementwise`] over `f64` buffers.
#[inline]
pub fn elementwise_f64(
    runtime: &Runtime,
    r: &mut [f64],
    a: &[f64],
    b: &[f64],
    c: &[f64],
    scalar: f64,
) -> Result<()> {
    elementwise(runtime, r, a, b, c, scalar)
}
