//! Parallel integer matrix multiplication.

use tracing::debug;

use crate::runtime::{wait_all, Result, Runtime, RuntimeError};

/// Row-major integer matrix.
pub type Matrix = Vec<Vec<i64>>;

/// Column count of `m`, rejecting ragged rows.
fn columns(
    m: &[Vec<i64>],
    name: &'static str,
) -> Result<usize> {
    let cols = m.first().map_or(0, Vec::len);
    match m.iter().find(|row| row.len() != cols) {
        Some(row) => Err(RuntimeError::dimension_mismatch(name, cols, row.len())),
        None => Ok(cols),
    }
}

fn row_times(
    row: &[i64],
    b: &[Vec<i64>],
    cols: usize,
) -> Result<Vec<i64>> {
    (0..cols)
        .map(|j| {
            row.iter().zip(b).try_fold(0i64, |acc, (&x, b_row)| {
                x.checked_mul(b_row[j])
                    .and_then(|product| acc.checked_add(product))
                    .ok_or_else(|| RuntimeError::Overflow("matrix product overflows i64".into()))
            })
        })
        .collect()
}

/// `a × b`.
///
/// An empty operand gives an empty result. Ragged rows or
/// `cols(a) != rows(b)` fail with [`RuntimeError::DimensionMismatch`]. Below
/// `thresholds.matrix_cells` result cells the product is computed on the
/// calling thread; above it every result row is its own task.
pub fn matrix_multiply(
    runtime: &Runtime,
    a: &[Vec<i64>],
    b: &[Vec<i64>],
) -> Result<Matrix> {
    if a.is_empty() || b.is_empty() {
        return Ok(Matrix::new());
    }

    let inner = columns(a, "matrix_multiply (rows of a)")?;
    let cols = columns(b, "matrix_multiply (rows of b)")?;
    if inner != b.len() {
        return Err(RuntimeError::dimension_mismatch("matrix_multiply", inner, b.len()));
    }

    let cells = a.len() * cols;
    if cells < runtime.config().thresholds.matrix_cells {
        return a.iter().map(|row| row_times(row, b, cols)).collect();
    }

    debug!(rows = a.len(), cols, inner, "parallel matrix multiply");
    runtime.scope(|s| {
        let rows: Vec<_> = a
            .iter()
            .map(|row| s.try_spawn(move || row_times(row, b, cols)))
            .collect();
        wait_all(&rows)?;
        rows.into_iter().map(|row| row.wait()).collect()
    })
}
