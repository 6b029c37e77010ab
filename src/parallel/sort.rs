//! Parallel merge sort.

use crate::runtime::{Result, Runtime};

/// Return a sorted copy of `data`; the input is not modified.
///
/// Halves are sorted in parallel with [`Runtime::join`] and merged through a
/// scratch buffer. Slices of at most `thresholds.sort_grain` elements use
/// `sort_unstable`, so equal elements may be reordered.
pub fn sort<T>(
    runtime: &Runtime,
    data: &[T],
) -> Result<Vec<T>>
where
    T: Ord + Clone + Send,
{
    let mut sorted = data.to_vec();
    if sorted.len() < 2 {
        return Ok(sorted);
    }

    let mut scratch = sorted.clone();
    let grain = runtime.config().thresholds.sort_grain.max(1);
    merge_sort(runtime, &mut sorted, &mut scratch, grain)?;
    Ok(sorted)
}

fn merge_sort<T>(
    runtime: &Runtime,
    data: &mut [T],
    scratch: &mut [T],
    grain: usize,
) -> Result<()>
where
    T: Ord + Clone + Send,
{
    if data.len() <= grain {
        data.sort_unstable();
        return Ok(());
    }

    let mid = data.len() / 2;
    {
        let (left, right) = data.split_at_mut(mid);
        let (left_scratch, right_scratch) = scratch.split_at_mut(mid);
        let (l, r) = runtime.join(
            || merge_sort(runtime, left, left_scratch, grain),
            || merge_sort(runtime, right, right_scratch, grain),
        )?;
        l.and(r)?;
    }

    merge(&data[..mid], &data[mid..], scratch);
    data.clone_from_slice(scratch);
    Ok(())
}

/// Merge two sorted runs into `out`, which must hold exactly both runs.
fn merge<T: Ord + Clone>(
    left: &[T],
    right: &[T],
    out: &mut [T],
) {
    let (mut i, mut j) = (0, 0);
    for slot in out.iter_mut() {
        let take_left = j == right.len() || (i < left.len() && left[i] <= right[j]);
        if take_left {
            slot.clone_from(&left[i]);
            i += 1;
        } else {
            slot.clone_from(&right[j]);
            j += 1;
        }
    }
}
