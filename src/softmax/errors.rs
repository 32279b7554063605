//! softmax::errors — shared error type, error classes, and Python bridge.
//!
//! Purpose
//! -------
//! Provide the single error enum and result alias used by every softmax
//! routine in this crate (block softmax, online accumulation, weighted
//! accumulation, reductions, and the blockwise driver), together with a
//! conversion layer to Python exceptions for PyO3-based bindings.
//!
//! Key behaviors
//! -------------
//! - Define [`SmResult`] and [`SoftmaxError`] as the canonical result and
//!   error types for the crate.
//! - Classify every variant into one of two coarse classes via
//!   [`SoftmaxError::kind`]: [`ErrorKind::InvalidInput`] (the caller built
//!   the input incorrectly) and [`ErrorKind::NumericDegenerate`] (the input
//!   is well-formed but softmax is undefined on it).
//! - Attach human-readable `Display` messages to each variant so that
//!   diagnostics are meaningful without additional context.
//! - Implement `From<SoftmaxError> for PyErr` to map failures into
//!   `PyValueError` values visible to Python callers.
//!
//! Invariants & assumptions
//! ------------------------
//! - No routine in this crate returns NaN in place of an error: every
//!   undefined softmax is reported through one of these variants.
//! - Errors are detected at the offending block and surfaced immediately;
//!   no partial output accompanies an error.
//! - `SoftmaxError` values are small, `Clone`, and `PartialEq` so tests can
//!   match on them directly.
//!
//! Conventions
//! -----------
//! - Indices carried in payloads are 0-based positions within the slice
//!   handed to the failing routine (block-local for block routines,
//!   global for read-out of a full accumulator).
//! - Messages are phrased in terms of domain constraints (“block lse must
//!   not be NaN”) rather than implementation details.
//!
//! Testing notes
//! -------------
//! - Unit tests verify that `Display` messages embed their payloads and
//!   that `kind()` classifies every variant as documented.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

/// Crate-wide result alias for softmax operations.
pub type SmResult<T> = Result<T, SoftmaxError>;

/// Coarse classification of [`SoftmaxError`] variants.
///
/// - `InvalidInput`: empty score vector, NaN present, or a malformed
///   block/state correspondence. The caller must fix input construction.
/// - `NumericDegenerate`: the input is well-formed but has no defined
///   softmax (all scores `-inf`, or a `+inf` score).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NumericDegenerate,
}

/// SoftmaxError — error conditions for stable and online softmax.
///
/// Variants
/// --------
/// - `EmptyScores`
///   A score vector of length zero was handed to a block routine.
/// - `NaNScore { index }`
///   The score at `index` is NaN.
/// - `PositiveInfinity { index }`
///   The score at `index` is `+inf`; softmax concentration is undefined
///   without a tie-break.
/// - `AllMasked { len }`
///   Every one of the `len` scores is `-inf` (or an accumulator holds no
///   mass at read-out), so the support is empty.
/// - `EmptyBlockWithFiniteLse { lse }`
///   A block has no outputs but claims a finite log-sum-exp.
/// - `InvalidBlockLse { value }`
///   A block lse is NaN.
/// - `InfiniteBlockLse`
///   A block lse is `+inf`.
/// - `InvalidBlockOutput { index, value }`
///   A block output entry is NaN or infinite.
/// - `WidthMismatch { expected, found }`
///   A weighted block has a different width than the running state.
/// - `IndexCountMismatch { indices, outputs }`
///   An explicitly placed block has a different number of positions than
///   output values.
/// - `DuplicatePosition { index }`
///   Two merged segments both claim position `index`.
/// - `MissingPosition { index }`
///   No merged segment covers position `index` at read-out.
/// - `PositionOverflow { offset, len }`
///   A block placed at `offset` with `len` positions runs past `usize::MAX`.
/// - `InvalidBlockSize { size }`
///   The driver was configured with a block size of zero.
/// - `ValueShapeMismatch { rows, scores }`
///   A value matrix does not have one row per score.
/// - `UnknownMaskPolicy { name }`
///   A mask policy name could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum SoftmaxError {
    // ---- Score validation ----
    EmptyScores,
    NaNScore { index: usize },
    PositiveInfinity { index: usize },
    AllMasked { len: usize },

    // ---- Block / state correspondence ----
    EmptyBlockWithFiniteLse { lse: f64 },
    InvalidBlockLse { value: f64 },
    InfiniteBlockLse,
    InvalidBlockOutput { index: usize, value: f64 },
    WidthMismatch { expected: usize, found: usize },
    IndexCountMismatch { indices: usize, outputs: usize },
    DuplicatePosition { index: usize },
    MissingPosition { index: usize },
    PositionOverflow { offset: usize, len: usize },

    // ---- Options ----
    InvalidBlockSize { size: usize },
    ValueShapeMismatch { rows: usize, scores: usize },
    UnknownMaskPolicy { name: String },
}

impl SoftmaxError {
    /// Coarse class of this error; see [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            SoftmaxError::PositiveInfinity { .. }
            | SoftmaxError::AllMasked { .. }
            | SoftmaxError::InfiniteBlockLse => ErrorKind::NumericDegenerate,
            _ => ErrorKind::InvalidInput,
        }
    }
}

impl std::error::Error for SoftmaxError {}

impl std::fmt::Display for SoftmaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Score validation ----
            SoftmaxError::EmptyScores => {
                write!(f, "Score vector is empty; softmax needs at least one score.")
            }
            SoftmaxError::NaNScore { index } => {
                write!(f, "Score at index {index} is NaN.")
            }
            SoftmaxError::PositiveInfinity { index } => {
                write!(f, "Score at index {index} is +inf; softmax is undefined.")
            }
            SoftmaxError::AllMasked { len } => {
                write!(f, "All {len} scores are -inf; softmax has empty support.")
            }
            // ---- Block / state correspondence ----
            SoftmaxError::EmptyBlockWithFiniteLse { lse } => {
                write!(f, "Block has no outputs but a finite lse: {lse}.")
            }
            SoftmaxError::InvalidBlockLse { value } => {
                write!(f, "Block lse must not be NaN; got: {value}.")
            }
            SoftmaxError::InfiniteBlockLse => {
                write!(f, "Block lse is +inf; the combined softmax is undefined.")
            }
            SoftmaxError::InvalidBlockOutput { index, value } => {
                write!(f, "Block output at index {index} is non-finite: {value}.")
            }
            SoftmaxError::WidthMismatch { expected, found } => {
                write!(f, "Block output width {found} does not match state width {expected}.")
            }
            SoftmaxError::IndexCountMismatch { indices, outputs } => {
                write!(f, "Block places {indices} positions but carries {outputs} outputs.")
            }
            SoftmaxError::DuplicatePosition { index } => {
                write!(f, "Position {index} is covered by more than one block.")
            }
            SoftmaxError::MissingPosition { index } => {
                write!(f, "Position {index} is not covered by any block.")
            }
            SoftmaxError::PositionOverflow { offset, len } => {
                write!(
                    f,
                    "Block at offset {offset} with {len} positions runs past the addressable range."
                )
            }
            // ---- Options ----
            SoftmaxError::InvalidBlockSize { size } => {
                write!(f, "Invalid block size: {size}. Must be at least 1.")
            }
            SoftmaxError::ValueShapeMismatch { rows, scores } => {
                write!(f, "Value matrix has {rows} rows but the block has {scores} scores.")
            }
            SoftmaxError::UnknownMaskPolicy { name } => {
                write!(f, "Unknown mask policy '{name}'. Expected 'error' or 'zero'.")
            }
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<SoftmaxError> for PyErr {
    fn from(err: SoftmaxError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
