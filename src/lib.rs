//! streaming_softmax — numerically stable blockwise softmax with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the blockwise softmax routines to Python via the
//! `_streaming_softmax` extension module. Softmax over a long score vector
//! is computed block by block: each block yields a locally normalized output
//! and its log-sum-exp, and an online accumulator merges those pairs into
//! the exact global softmax without ever exponentiating a positive number.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules: [`softmax`] (block softmax,
//!   accumulators, reductions, errors) and [`blockwise`] (the driver that
//!   partitions a full input and its options).
//! - Define `#[pyfunction]`s, the `StreamingSoftmax` `#[pyclass]`, and the
//!   `#[pymodule]` initializer when `python-bindings` is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs FFI
//!   glue, input conversion, and error mapping only.
//! - Scores are `f64`, never NaN or `+inf`; `-inf` marks a masked entry.
//!
//! Conventions
//! -----------
//! - Rust errors are [`softmax::SoftmaxError`] values and surface in Python
//!   as `ValueError` carrying the `Display` message.
//! - Python functions return `(output, lse)` tuples with `output` as a
//!   NumPy `float64` array.
//!
//! Downstream usage
//! ----------------
//! - Rust code usually imports `streaming_softmax::softmax::prelude::*` or
//!   the [`blockwise`] driver and ignores the PyO3 items.
//! - The Python packaging layer imports `_streaming_softmax` and may wrap it
//!   in a thin pure-Python facade.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   the integration and property tests under `tests/`.

pub mod blockwise;
pub mod softmax;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    blockwise::driver::BlockwiseSoftmax,
    softmax::{
        accumulator::AccumulatorState, block::compute_block_softmax, mask::MaskPolicy,
        validation::validate_block,
    },
    utils::{
        as_contiguous, extract_blockwise_options, extract_f64_array, extract_f64_matrix,
        extract_mask_policy,
    },
};

/// compute_block_softmax — stable softmax of a single block.
///
/// Parameters
/// ----------
/// - `data`: `&PyAny`
///   One-dimensional array-like of `float64` scores; non-empty, no NaN, no
///   `+inf`.
///
/// Returns
/// -------
/// `(numpy.ndarray, float)`
///   The block softmax and the block log-sum-exp.
///
/// Errors
/// ------
/// - `ValueError` for invalid or fully masked input; `TypeError` when `data`
///   is not array-like.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(name = "compute_block_softmax", text_signature = "(data, /)")]
fn py_compute_block_softmax<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>,
) -> PyResult<(Bound<'py, PyArray1<f64>>, f64)> {
    let arr = extract_f64_array(py, data)?;
    let scores = as_contiguous(&arr)?;
    let (output, lse) = compute_block_softmax(scores)?.into_parts();
    Ok((output.into_pyarray(py), lse))
}

/// blockwise_softmax — softmax of a full vector computed block by block.
///
/// Parameters
/// ----------
/// - `data`: `&PyAny`
///   One-dimensional array-like of `float64` scores.
/// - `block_size`: `int`, default `64`
///   Positive number of scores per block.
/// - `mask_policy`: `str`, default `"error"`
///   `"error"` raises on fully masked input; `"zero"` returns zeros with
///   `lse = -inf`.
/// - `parallel`: `bool`, default `False`
///   Compute and reduce the blocks on the rayon thread pool.
///
/// Returns
/// -------
/// `(numpy.ndarray, float)`
///   The global softmax and the global log-sum-exp.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    name = "blockwise_softmax",
    text_signature = "(data, /, block_size=64, mask_policy='error', parallel=False)",
    signature = (data, block_size = None, mask_policy = None, parallel = None)
)]
fn py_blockwise_softmax<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>, block_size: Option<usize>,
    mask_policy: Option<&str>, parallel: Option<bool>,
) -> PyResult<(Bound<'py, PyArray1<f64>>, f64)> {
    let opts = extract_blockwise_options(block_size, mask_policy, parallel)?;
    let arr = extract_f64_array(py, data)?;
    let scores = as_contiguous(&arr)?;
    let (output, lse) = BlockwiseSoftmax::new(opts).run(scores)?.into_parts();
    Ok((output.into_pyarray(py), lse))
}

/// blockwise_attention — softmax-weighted sum of value rows, block by block.
///
/// Parameters
/// ----------
/// - `data`: `&PyAny`
///   One-dimensional array-like of `n` scores.
/// - `values`: `&PyAny`
///   `n × d` array-like of `float64` values.
/// - `block_size`, `mask_policy`, `parallel`
///   As for `blockwise_softmax`.
///
/// Returns
/// -------
/// `(numpy.ndarray, float)`
///   The length-`d` weighted output and the global log-sum-exp.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    name = "blockwise_attention",
    text_signature = "(data, values, /, block_size=64, mask_policy='error', parallel=False)",
    signature = (data, values, block_size = None, mask_policy = None, parallel = None)
)]
fn py_blockwise_attention<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>, values: &Bound<'py, PyAny>,
    block_size: Option<usize>, mask_policy: Option<&str>, parallel: Option<bool>,
) -> PyResult<(Bound<'py, PyArray1<f64>>, f64)> {
    let opts = extract_blockwise_options(block_size, mask_policy, parallel)?;
    let arr = extract_f64_array(py, data)?;
    let scores = as_contiguous(&arr)?;
    let matrix = extract_f64_matrix(py, values)?;
    let (output, lse) =
        BlockwiseSoftmax::new(opts).run_weighted(scores, matrix.as_array())?.into_parts();
    Ok((output.into_pyarray(py), lse))
}

/// StreamingSoftmax — Python-facing online softmax accumulator.
///
/// Purpose
/// -------
/// Let Python callers feed `(block_output, block_lse)` pairs one at a time,
/// e.g. from blocks computed elsewhere, and read out the global softmax at
/// the end.
///
/// Fields
/// ------
/// - `inner`: [`AccumulatorState`]
///   Running state; blocks are placed contiguously in merge order.
/// - `mask_policy`: [`MaskPolicy`]
///   Read-out policy when no mass was accumulated.
///
/// Notes
/// -----
/// - A block is validated before the state is touched, so a rejected block
///   leaves the accumulator unchanged.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "streaming_softmax")]
pub struct StreamingSoftmax {
    inner: AccumulatorState,
    mask_policy: MaskPolicy,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl StreamingSoftmax {
    #[new]
    #[pyo3(text_signature = "(mask_policy='error')", signature = (mask_policy = None))]
    pub fn new(mask_policy: Option<&str>) -> PyResult<StreamingSoftmax> {
        Ok(StreamingSoftmax {
            inner: AccumulatorState::initial(),
            mask_policy: extract_mask_policy(mask_policy)?,
        })
    }

    /// Merge one block's softmax output and log-sum-exp.
    #[pyo3(text_signature = "(self, block_output, block_lse, /)")]
    pub fn merge<'py>(
        &mut self, py: Python<'py>, block_output: &Bound<'py, PyAny>, block_lse: f64,
    ) -> PyResult<()> {
        let arr = extract_f64_array(py, block_output)?;
        let output = as_contiguous(&arr)?;
        validate_block(output, block_lse)?;
        let state = std::mem::take(&mut self.inner);
        self.inner = state.merge(output, block_lse)?;
        Ok(())
    }

    /// Running log-sum-exp of everything merged so far.
    #[getter]
    pub fn lse(&self) -> f64 {
        self.inner.lse()
    }

    /// Number of non-empty blocks merged so far.
    #[getter]
    pub fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }

    pub fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Global softmax of all merged blocks, as `(output, lse)`.
    pub fn finalize<'py>(&self, py: Python<'py>) -> PyResult<(Bound<'py, PyArray1<f64>>, f64)> {
        let (output, lse) = self.inner.clone().finalize_with(self.mask_policy)?.into_parts();
        Ok((output.into_pyarray(py), lse))
    }
}

/// _streaming_softmax — Python module initialization.
///
/// Registers the free functions and the `StreamingSoftmax` class. Invoked by
/// Python when the compiled extension is imported.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _streaming_softmax<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_compute_block_softmax, m)?)?;
    m.add_function(wrap_pyfunction!(py_blockwise_softmax, m)?)?;
    m.add_function(wrap_pyfunction!(py_blockwise_attention, m)?)?;
    m.add_class::<StreamingSoftmax>()?;
    Ok(())
}
