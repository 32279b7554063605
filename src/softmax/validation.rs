//! softmax::validation — shared input guards for block and merge routines.
//!
//! Purpose
//! -------
//! Centralize the checks that every entry point performs before touching
//! the numbers: score vectors handed to the block softmax, and
//! `(block_output, block_lse)` pairs handed to the accumulators.
//!
//! Key behaviors
//! -------------
//! - Reject empty score vectors, NaN scores, and `+inf` scores with the
//!   position of the first offender.
//! - Reject block statistics that cannot be combined: NaN or `+inf`
//!   lse, non-finite outputs, or an empty block claiming finite mass.
//!
//! Invariants & assumptions
//! ------------------------
//! - `-inf` is a legal score (a masked position) and a legal block lse (an
//!   empty or fully masked block); what to do when *every* score is `-inf`
//!   depends on [`MaskPolicy`](crate::softmax::mask::MaskPolicy) and is
//!   decided by the caller, not here.
//! - Scans stop at the first offending element.
//!
//! Conventions
//! -----------
//! - Pure, allocation-free functions returning [`SmResult<()>`].
//!
//! Testing notes
//! -------------
//! - Unit tests cover every error branch and the accepted `-inf` cases.

use crate::softmax::errors::{SmResult, SoftmaxError};

/// Validate a score vector for the block softmax.
///
/// Parameters
/// ----------
/// - `scores`: `&[f64]`
///   Raw scores of one block. Must be non-empty and free of NaN and
///   `+inf`; `-inf` entries are allowed.
///
/// Returns
/// -------
/// `SmResult<()>`
///   - `Ok(())` if the slice can be normalized (possibly subject to the
///     all-masked policy).
///
/// Errors
/// ------
/// - `SoftmaxError::EmptyScores` when `scores.is_empty()`.
/// - `SoftmaxError::NaNScore { index }` for the first NaN.
/// - `SoftmaxError::PositiveInfinity { index }` for the first `+inf`.
///
/// Examples
/// --------
/// ```rust
/// # use streaming_softmax::softmax::validation::validate_scores;
/// # use streaming_softmax::softmax::errors::SoftmaxError;
/// assert!(validate_scores(&[0.5, f64::NEG_INFINITY]).is_ok());
/// assert_eq!(validate_scores(&[]), Err(SoftmaxError::EmptyScores));
/// ```
pub fn validate_scores(scores: &[f64]) -> SmResult<()> {
    if scores.is_empty() {
        return Err(SoftmaxError::EmptyScores);
    }
    for (index, &value) in scores.iter().enumerate() {
        if value.is_nan() {
            return Err(SoftmaxError::NaNScore { index });
        }
        if value == f64::INFINITY {
            return Err(SoftmaxError::PositiveInfinity { index });
        }
    }
    Ok(())
}

/// Validate a block log-sum-exp before it enters a merge.
///
/// `-inf` and finite values pass; NaN is `InvalidBlockLse` and `+inf` is
/// `InfiniteBlockLse`.
pub fn validate_block_lse(lse: f64) -> SmResult<()> {
    if lse.is_nan() {
        return Err(SoftmaxError::InvalidBlockLse { value: lse });
    }
    if lse == f64::INFINITY {
        return Err(SoftmaxError::InfiniteBlockLse);
    }
    Ok(())
}

/// Validate a `(block_output, block_lse)` pair before it enters a merge.
///
/// Parameters
/// ----------
/// - `output`: `&[f64]`
///   The block's normalized output (softmax weights, or a
///   probability-weighted value vector). Every entry must be finite.
/// - `lse`: `f64`
///   The block's log-sum-exp; finite, or `-inf` for a block with no mass.
///
/// Errors
/// ------
/// - Everything [`validate_block_lse`] reports.
/// - `SoftmaxError::EmptyBlockWithFiniteLse { lse }` when `output` is
///   empty while `lse` is finite.
/// - `SoftmaxError::InvalidBlockOutput { index, value }` for the first
///   non-finite output entry.
pub fn validate_block(output: &[f64], lse: f64) -> SmResult<()> {
    validate_block_lse(lse)?;
    if output.is_empty() && lse.is_finite() {
        return Err(SoftmaxError::EmptyBlockWithFiniteLse { lse });
    }
    if let Some((index, &value)) = output.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(SoftmaxError::InvalidBlockOutput { index, value });
    }
    Ok(())
}
