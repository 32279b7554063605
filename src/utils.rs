//! utils — conversion helpers for the Python bindings.
//!
//! Everything here runs at the PyO3 boundary: pull numeric arrays out of
//! arbitrary Python objects (NumPy arrays, pandas objects, plain
//! sequences) and turn keyword arguments into validated Rust options.
//! Errors are mapped to `TypeError`/`ValueError` before they reach Python.

#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec / Array2 → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
use crate::{
    blockwise::options::{BlockwiseOptions, DEFAULT_BLOCK_SIZE},
    softmax::mask::MaskPolicy,
};

/// Borrow or copy a 1-D `float64` score vector from a Python object.
///
/// A contiguous NumPy array is borrowed as is; an object exposing
/// `to_numpy()` (pandas `Series`) is borrowed through that array when it is
/// contiguous; anything else must be a sequence of floats and is copied.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    let borrowed = borrow_contiguous(raw_data).or_else(|| {
        raw_data.call_method0("to_numpy").ok().and_then(|arr| borrow_contiguous(&arr))
    });
    if let Some(arr) = borrowed {
        return Ok(arr);
    }

    let copied: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64")
    })?;
    Ok(copied.into_pyarray(py).readonly())
}

/// A 1-D `float64` NumPy view of `obj`, if it is one and is contiguous.
#[cfg(feature = "python-bindings")]
fn borrow_contiguous<'py>(obj: &Bound<'py, PyAny>) -> Option<PyReadonlyArray1<'py, f64>> {
    obj.extract::<PyReadonlyArray1<f64>>().ok().filter(|arr| as_contiguous(arr).is_ok())
}

/// Borrow or copy a 2-D `float64` matrix from a Python object.
///
/// Accepts a NumPy array, a pandas `DataFrame` (via `to_numpy()`), or a
/// list of equally long rows.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray2<'py, f64>> {
    let borrowed = raw_data.extract::<PyReadonlyArray2<f64>>().ok().or_else(|| {
        raw_data.call_method0("to_numpy").ok().and_then(|frame| frame.extract().ok())
    });
    if let Some(matrix) = borrowed {
        return Ok(matrix);
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or list of float64 rows",
        )
    })?;
    let n = rows.len();
    let d = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != d) {
        return Err(PyValueError::new_err("all rows of values must have the same length"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((n, d), flat)
        .map_err(|e| PyValueError::new_err(format!("invalid values matrix: {e}")))?;
    Ok(matrix.into_pyarray(py).readonly())
}

/// View a borrowed 1-D array as a slice, rejecting non-contiguous input.
#[cfg(feature = "python-bindings")]
pub fn as_contiguous<'a>(arr: &'a PyReadonlyArray1<'_, f64>) -> PyResult<&'a [f64]> {
    arr.as_slice().map_err(|_| {
        PyValueError::new_err("expected a contiguous 1-D numpy.ndarray of float64")
    })
}

/// Parse the `mask_policy` keyword (`"error"` when omitted).
#[cfg(feature = "python-bindings")]
pub fn extract_mask_policy(mask_policy: Option<&str>) -> PyResult<MaskPolicy> {
    match mask_policy {
        None => Ok(MaskPolicy::default()),
        Some(name) => Ok(name.parse::<MaskPolicy>()?),
    }
}

/// Build driver options from the Python keyword arguments.
#[cfg(feature = "python-bindings")]
pub fn extract_blockwise_options(
    block_size: Option<usize>, mask_policy: Option<&str>, parallel: Option<bool>,
) -> PyResult<BlockwiseOptions> {
    let policy = extract_mask_policy(mask_policy)?;
    let opts = BlockwiseOptions::new(
        block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
        policy,
        parallel.unwrap_or(false),
        false,
    )?;
    Ok(opts)
}
