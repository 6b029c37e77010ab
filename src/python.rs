//! Python bindings (`python` feature)
//!
//! Exposes the process default runtime as the `weft` extension module. The
//! GIL is the host lock: every blocking call releases it while it waits, and
//! Python callbacks take it back on the worker that runs them.

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyOverflowError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

use crate::runtime::{HostLock, RuntimeError};

create_exception!(weft, WeftError, PyException);

/// The GIL as a [`HostLock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Gil;

impl HostLock for Gil {
    fn unlocked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        Python::with_gil(|py| py.allow_threads(f))
    }

    fn locked<F, R>(
        &self,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        Python::with_gil(|_py| f())
    }
}

fn to_py_err(error: RuntimeError) -> PyErr {
    match error {
        RuntimeError::Overflow(_) => PyOverflowError::new_err(error.to_string()),
        RuntimeError::DimensionMismatch { .. } => PyValueError::new_err(error.to_string()),
        other => WeftError::new_err(other.to_string()),
    }
}

/// Start the runtime; returns its worker count.
#[pyfunction]
#[pyo3(signature = (threads = None))]
fn start(
    py: Python<'_>,
    threads: Option<usize>,
) -> PyResult<usize> {
    py.allow_threads(|| crate::start(threads))
        .map(|runtime| runtime.num_workers())
        .map_err(to_py_err)
}

/// Stop the runtime; returns whether it was running.
#[pyfunction]
fn stop(py: Python<'_>) -> bool {
    py.allow_threads(crate::stop)
}

#[pyfunction]
fn factorial(
    py: Python<'_>,
    n: u64,
) -> PyResult<u64> {
    py.allow_threads(|| crate::factorial(n)).map_err(to_py_err)
}

#[pyfunction]
fn reduce_sum(
    py: Python<'_>,
    data: Vec<i64>,
) -> PyResult<i64> {
    py.allow_threads(|| crate::reduce_sum(&data)).map_err(to_py_err)
}

#[pyfunction]
fn sort(
    py: Python<'_>,
    data: Vec<i64>,
) -> PyResult<Vec<i64>> {
    py.allow_threads(|| crate::sort(&data)).map_err(to_py_err)
}

#[pyfunction]
fn matrix_multiply(
    py: Python<'_>,
    a: Vec<Vec<i64>>,
    b: Vec<Vec<i64>>,
) -> PyResult<Vec<Vec<i64>>> {
    py.allow_threads(|| crate::matrix_multiply(&a, &b))
        .map_err(to_py_err)
}

/// `[scalar * a[i] + b[i] * c[i] for i]`.
#[pyfunction]
fn elementwise(
    py: Python<'_>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    scalar: f64,
) -> PyResult<Vec<f64>> {
    py.allow_threads(|| {
        let mut r = vec![0.0; a.len()];
        crate::elementwise(&mut r, &a, &b, &c, scalar).map(|()| r)
    })
    .map_err(to_py_err)
}

/// Call `callback(arg)` on a worker thread and return its result.
#[pyfunction]
fn invoke_callback(
    py: Python<'_>,
    callback: PyObject,
    arg: i64,
) -> PyResult<PyObject> {
    let runtime = py.allow_threads(crate::runtime).map_err(to_py_err)?;
    let outcome = crate::runtime::invoke_callback(
        &runtime,
        &Arc::new(Gil),
        move |x| Python::with_gil(|py| callback.call1(py, (x,))),
        arg,
    );
    outcome.map_err(to_py_err)?
}

#[pymodule]
#[pyo3(name = "weft")]
fn weft_module(
    py: Python<'_>,
    m: &Bound<'_, PyModule>,
) -> PyResult<()> {
    m.add("WeftError", py.get_type_bound::<WeftError>())?;
    m.add("__version__", crate::VERSION)?;
    m.add_function(wrap_pyfunction!(start, m)?)?;
    m.add_function(wrap_pyfunction!(stop, m)?)?;
    m.add_function(wrap_pyfunction!(factorial, m)?)?;
    m.add_function(wrap_pyfunction!(reduce_sum, m)?)?;
    m.add_function(wrap_pyfunction!(sort, m)?)?;
    m.add_function(wrap_pyfunction!(matrix_multiply, m)?)?;
    m.add_function(wrap_pyfunction!(elementwise, m)?)?;
    m.add_function(wrap_pyfunction!(invoke_callback, m)?)?;
    Ok(())
}
