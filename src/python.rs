//! Python bindings over the argkmin kernel.

use numpy::{IntoPyArray, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::algo::{ArgKmin, Strategy};
use crate::error::ArgKminError;

fn compute<'py, T>(
    py: Python<'py>,
    x: PyReadonlyArray2<'py, T>,
    y: PyReadonlyArray2<'py, T>,
    k: usize,
    chunk_size: usize,
    strategy: &str,
    return_distance: bool,
) -> PyResult<PyObject>
where
    T: numpy::Element + num_traits::Float + std::fmt::Debug + Send + Sync + std::iter::Sum,
{
    let strategy: Strategy = strategy
        .parse()
        .map_err(|e: ArgKminError| PyValueError::new_err(e.to_string()))?;
    let out = ArgKmin::new()
        .chunk_size(chunk_size)
        .strategy(strategy)
        .return_distance(return_distance)
        .compute(x.as_array(), y.as_array(), k)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let indices = out.indices.into_pyarray_bound(py);
    match out.distances {
        Some(distances) => Ok((distances.into_pyarray_bound(py), indices).into_py(py)),
        None => Ok(indices.into_py(py)),
    }
}

#[pyfunction]
#[pyo3(signature = (x, y, k, chunk_size = 256, strategy = "auto", return_distance = false))]
fn argkmin_f32<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<'py, f32>,
    y: PyReadonlyArray2<'py, f32>,
    k: usize,
    chunk_size: usize,
    strategy: &str,
    return_distance: bool,
) -> PyResult<PyObject> {
    compute(py, x, y, k, chunk_size, strategy, return_distance)
}

#[pyfunction]
#[pyo3(signature = (x, y, k, chunk_size = 256, strategy = "auto", return_distance = false))]
fn argkmin_f64<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<'py, f64>,
    y: PyReadonlyArray2<'py, f64>,
    k: usize,
    chunk_size: usize,
    strategy: &str,
    return_distance: bool,
) -> PyResult<PyObject> {
    compute(py, x, y, k, chunk_size, strategy, return_distance)
}

/// The Rust backend module for NeighborsX
#[pymodule]
fn neighborsx_backend(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(argkmin_f32, m)?)?;
    m.add_function(wrap_pyfunction!(argkmin_f64, m)?)?;
    Ok(())
}
