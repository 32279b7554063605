//! softmax::block — numerically stable softmax of a single score block.
//!
//! Purpose
//! -------
//! Turn one finite score vector into its softmax output and log-sum-exp
//! (LSE) statistic. This is the per-block unit of work that the online
//! accumulators and the blockwise driver are built on.
//!
//! Key behaviors
//! -------------
//! - Shift every score by the block maximum `m` before exponentiating, so
//!   each exponent argument is `≤ 0` and every term lies in `[0, 1]`.
//! - Normalize by `s = ∑ exp(xᵢ − m)` (which is `≥ 1`) and report
//!   `lse = m + ln s`, the exact log-sum-exp of the unshifted scores.
//! - Treat `-inf` scores as masked positions with output `0`; a block whose
//!   every score is masked follows the caller's [`MaskPolicy`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `exp` is never evaluated on a positive argument.
//! - On success with at least one finite score, `output` sums to one within
//!   `len · SUM_TOL_PER_ELEMENT` and every unmasked entry lies in `(0, 1]`.
//! - Pure functions; no logging and no global state.
//!
//! Downstream usage
//! ----------------
//! - The blockwise driver calls [`compute_block_softmax_with`] once per
//!   block and feeds `(output, lse)` into an
//!   [`AccumulatorState`](crate::softmax::accumulator::AccumulatorState).
//! - Attention-style callers pass the [`SoftmaxOutcome`] to
//!   [`weighted_block`](crate::softmax::weighted::weighted_block).
//!
//! Testing notes
//! -------------
//! - Unit tests cover uniform output on equal scores, the ln 2 scenario,
//!   large-magnitude dominance, masking, and every error path.

use ndarray::Array1;

use crate::softmax::{
    errors::{SmResult, SoftmaxError},
    mask::MaskPolicy,
    numerics::max_score,
    validation::validate_scores,
};

/// SoftmaxOutcome — softmax output and log-sum-exp of one score vector.
///
/// Fields
/// ------
/// - `output`: `Array1<f64>`
///   Normalized weights, same length and order as the input scores.
/// - `lse`: `f64`
///   `ln ∑ exp(xᵢ)` over the unshifted input; `-inf` only for an
///   all-masked block under [`MaskPolicy::ZeroOutput`].
///
/// Invariants
/// ----------
/// - `output.len()` equals the input length (≥ 1).
/// - If `lse` is finite, `output` sums to one within tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxOutcome {
    output: Array1<f64>,
    lse: f64,
}

impl SoftmaxOutcome {
    /// Normalized softmax output.
    pub fn output(&self) -> &Array1<f64> {
        &self.output
    }

    /// Log-sum-exp of the original scores.
    pub fn lse(&self) -> f64 {
        self.lse
    }

    /// Number of scores in the block.
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Always `false` for an outcome produced by this module.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Split into `(output, lse)`.
    pub fn into_parts(self) -> (Array1<f64>, f64) {
        (self.output, self.lse)
    }

    pub(crate) fn from_parts(output: Array1<f64>, lse: f64) -> Self {
        SoftmaxOutcome { output, lse }
    }
}

/// Compute the stable softmax of one block, rejecting all-masked input.
///
/// Equivalent to [`compute_block_softmax_with`] with
/// [`MaskPolicy::Error`].
///
/// Examples
/// --------
/// ```rust
/// use streaming_softmax::softmax::block::compute_block_softmax;
///
/// let outcome = compute_block_softmax(&[1000.0, 1000.0 + 2.0_f64.ln()]).unwrap();
/// assert!((outcome.output()[0] - 1.0 / 3.0).abs() < 1e-12);
/// assert!((outcome.lse() - (1000.0 + 3.0_f64.ln())).abs() < 1e-9);
/// ```
pub fn compute_block_softmax(scores: &[f64]) -> SmResult<SoftmaxOutcome> {
    compute_block_softmax_with(scores, MaskPolicy::Error)
}

/// Compute the stable softmax of one block.
///
/// Parameters
/// ----------
/// - `scores`: `&[f64]`
///   Raw scores; non-empty, no NaN, no `+inf`. `-inf` marks a masked
///   position.
/// - `policy`: [`MaskPolicy`]
///   Behavior when every score is `-inf`.
///
/// Returns
/// -------
/// `SmResult<SoftmaxOutcome>`
///   - `output[i] = exp(xᵢ − m) / s` and `lse = m + ln s`, where
///     `m = max(x)` and `s = ∑ exp(xⱼ − m)`.
///   - For an all-masked block under `MaskPolicy::ZeroOutput`: zeros and
///     `lse = -inf`.
///
/// Errors
/// ------
/// - `EmptyScores`, `NaNScore`, `PositiveInfinity` from
///   [`validate_scores`].
/// - `AllMasked { len }` for an all-masked block under
///   `MaskPolicy::Error`.
pub fn compute_block_softmax_with(scores: &[f64], policy: MaskPolicy) -> SmResult<SoftmaxOutcome> {
    validate_scores(scores)?;
    let m = max_score(scores);
    if m == f64::NEG_INFINITY {
        return masked_outcome(scores.len(), policy);
    }

    let mut weights: Array1<f64> = scores.iter().map(|&x| (x - m).exp()).collect();
    let total = weights.sum();
    weights.mapv_inplace(|w| w / total);

    Ok(SoftmaxOutcome { output: weights, lse: m + total.ln() })
}

/// Log-sum-exp of a score vector without materializing the output.
///
/// Returns `-inf` for an all-masked vector; that value is a valid empty
/// block lse for the accumulators.
///
/// Errors
/// ------
/// - `EmptyScores`, `NaNScore`, `PositiveInfinity` from
///   [`validate_scores`].
pub fn log_sum_exp(scores: &[f64]) -> SmResult<f64> {
    validate_scores(scores)?;
    let m = max_score(scores);
    if m == f64::NEG_INFINITY {
        return Ok(f64::NEG_INFINITY);
    }
    let total: f64 = scores.iter().map(|&x| (x - m).exp()).sum();
    Ok(m + total.ln())
}

fn masked_outcome(len: usize, policy: MaskPolicy) -> SmResult<SoftmaxOutcome> {
    match policy {
        MaskPolicy::Error => Err(SoftmaxError::AllMasked { len }),
        MaskPolicy::ZeroOutput => {
            Ok(SoftmaxOutcome { output: Array1::zeros(len), lse: f64::NEG_INFINITY })
        }
    }
}
