//! softmax::weighted — online combination of probability-weighted outputs.
//!
//! Purpose
//! -------
//! Carry the same log-domain rescaling law as
//! [`AccumulatorState`](crate::softmax::accumulator::AccumulatorState) over
//! to the flash-attention use, where each block contributes a fixed-width
//! vector `oᵦ = ∑ᵢ pᵢ vᵢ` (softmax weights of the block applied to its value
//! rows) together with the block's lse. Blocks are *added* after rescaling
//! instead of concatenated:
//!
//! `o = o_a · exp(lse_a − new_lse) + o_b · exp(lse_b − new_lse)`,
//! `new_lse = log_add_exp(lse_a, lse_b)`.
//!
//! Key behaviors
//! -------------
//! - Fix the output width with the first non-empty block and reject any
//!   later block of a different width.
//! - Treat `block_lse = -inf` as a block without mass (no-op on the
//!   output), exactly like the concatenating accumulator.
//! - Build a block's contribution from a block softmax and its `n × d`
//!   value matrix via [`weighted_block`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The running output is always normalized against the running lse, so
//!   after the last block it equals `softmax(all scores) · V`.
//! - Merges are associative and commutative up to rounding.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::softmax::{
    block::SoftmaxOutcome,
    errors::{SmResult, SoftmaxError},
    mask::MaskPolicy,
    numerics::{log_add_exp, rescale_factor},
    validation::validate_block,
};

/// Output of a weighted accumulation: the combined vector and its lse.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedOutcome {
    output: Array1<f64>,
    lse: f64,
}

impl WeightedOutcome {
    /// Combined probability-weighted vector.
    pub fn output(&self) -> &Array1<f64> {
        &self.output
    }

    /// Log-sum-exp over every score that contributed.
    pub fn lse(&self) -> f64 {
        self.lse
    }

    /// Split into `(output, lse)`.
    pub fn into_parts(self) -> (Array1<f64>, f64) {
        (self.output, self.lse)
    }
}

/// WeightedState — running result of a weighted online softmax.
///
/// `output` is `None` until the first non-empty block fixes the width.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedState {
    output: Option<Array1<f64>>,
    lse: f64,
}

impl Default for WeightedState {
    fn default() -> Self {
        Self::initial()
    }
}

impl WeightedState {
    /// Identity state: no output and `lse = -inf`.
    pub fn initial() -> Self {
        WeightedState { output: None, lse: f64::NEG_INFINITY }
    }

    /// Running log-sum-exp.
    pub fn lse(&self) -> f64 {
        self.lse
    }

    /// Output width, once fixed by a non-empty block.
    pub fn width(&self) -> Option<usize> {
        self.output.as_ref().map(|o| o.len())
    }

    /// Current combined output, normalized against the running lse.
    pub fn output(&self) -> Option<&Array1<f64>> {
        self.output.as_ref()
    }

    /// Merge one block's weighted vector and lse.
    ///
    /// Parameters
    /// ----------
    /// - `block_output`: `ArrayView1<f64>`
    ///   `∑ᵢ pᵢ vᵢ` for the block, with `pᵢ` the block-local softmax.
    /// - `block_lse`: `f64`
    ///   Block log-sum-exp; `-inf` for a block without mass.
    ///
    /// Errors
    /// ------
    /// - Everything
    ///   [`validate_block`](crate::softmax::validation::validate_block)
    ///   reports.
    /// - `WidthMismatch { expected, found }` when the width differs from
    ///   earlier blocks.
    pub fn merge(mut self, block_output: ArrayView1<'_, f64>, block_lse: f64) -> SmResult<Self> {
        let values = block_output.to_vec();
        validate_block(&values, block_lse)?;
        if values.is_empty() {
            return Ok(self);
        }
        if let Some(expected) = self.width() {
            if expected != values.len() {
                return Err(SoftmaxError::WidthMismatch { expected, found: values.len() });
            }
        }

        let new_lse = log_add_exp(self.lse, block_lse);
        let keep = rescale_factor(self.lse, new_lse);
        let take = rescale_factor(block_lse, new_lse);
        let mut combined = self.output.take().unwrap_or_else(|| Array1::zeros(values.len()));
        combined *= keep;
        combined.scaled_add(take, &block_output);

        self.output = Some(combined);
        self.lse = new_lse;
        Ok(self)
    }

    /// Combine two weighted states over disjoint score sets.
    ///
    /// Errors
    /// ------
    /// - `WidthMismatch` when both states have fixed, different widths.
    pub fn combine(self, other: WeightedState) -> SmResult<Self> {
        match other.output {
            Some(ref out) => self.merge(out.view(), other.lse),
            None => Ok(self),
        }
    }

    /// Read out the combined vector, rejecting a state with no mass.
    pub fn finalize(self) -> SmResult<WeightedOutcome> {
        self.finalize_with(MaskPolicy::Error)
    }

    /// Read out the combined vector.
    ///
    /// Errors
    /// ------
    /// - `AllMasked { len }` when no mass was accumulated under
    ///   `MaskPolicy::Error` (`len` is the output width, 0 if never fixed).
    ///   Under `MaskPolicy::ZeroOutput` the output is zeros with
    ///   `lse = -inf`.
    pub fn finalize_with(self, policy: MaskPolicy) -> SmResult<WeightedOutcome> {
        let width = self.width().unwrap_or(0);
        if self.lse == f64::NEG_INFINITY {
            return match policy {
                MaskPolicy::Error => Err(SoftmaxError::AllMasked { len: width }),
                MaskPolicy::ZeroOutput => {
                    Ok(WeightedOutcome { output: Array1::zeros(width), lse: f64::NEG_INFINITY })
                }
            };
        }
        let output = self.output.unwrap_or_else(|| Array1::zeros(width));
        Ok(WeightedOutcome { output, lse: self.lse })
    }
}

/// Probability-weighted sum of a block's value rows.
///
/// Parameters
/// ----------
/// - `outcome`: [`SoftmaxOutcome`]
///   Block softmax over `n` scores.
/// - `values`: `ArrayView2<f64>`
///   `n × d` value matrix, one row per score.
///
/// Returns
/// -------
/// `SmResult<(Array1<f64>, f64)>`
///   `(Vᵀ p, lse)`, ready for [`WeightedState::merge`].
///
/// Errors
/// ------
/// - `ValueShapeMismatch { rows, scores }` when `values.nrows() != n`.
pub fn weighted_block(
    outcome: &SoftmaxOutcome, values: ArrayView2<'_, f64>,
) -> SmResult<(Array1<f64>, f64)> {
    if values.nrows() != outcome.len() {
        return Err(SoftmaxError::ValueShapeMismatch {
            rows: values.nrows(),
            scores: outcome.len(),
        });
    }
    Ok((values.t().dot(outcome.output()), outcome.lse()))
}
