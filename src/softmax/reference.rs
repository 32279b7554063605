//! Reference softmax computations, kept as correctness baselines.
//!
//! [`two_pass_softmax`]: pass one walks the blocks and maintains a running maximum `m` and a
//! running sum `l = ∑ exp(xᵢ − m)`, rescaling `l` whenever `m` grows. Pass
//! two revisits every score and writes `exp(xᵢ − m) / l`. This needs the
//! whole input twice, which the single-pass accumulator avoids; it exists so
//! tests can compare the accumulator against an independent computation.
//!
//! [`compensated_softmax`]: one block, with the shifted exponentials summed
//! by Neumaier's compensated summation. Its normalizer carries an error
//! independent of the input length, so it is a tighter yardstick than a
//! plain `f64` sum when checking long or large-magnitude inputs.

use ndarray::Array1;

use crate::softmax::{
    block::SoftmaxOutcome,
    errors::{SmResult, SoftmaxError},
    numerics::{max_score, rescale_factor},
    validation::validate_scores,
};

/// Blockwise two-pass softmax over `scores` with blocks of `block_size`.
///
/// Errors
/// ------
/// - `InvalidBlockSize` when `block_size == 0`.
/// - Everything [`validate_scores`] reports.
/// - `AllMasked { len }` when every score is `-inf`.
pub fn two_pass_softmax(scores: &[f64], block_size: usize) -> SmResult<SoftmaxOutcome> {
    if block_size == 0 {
        return Err(SoftmaxError::InvalidBlockSize { size: block_size });
    }
    validate_scores(scores)?;

    let mut running_max = f64::NEG_INFINITY;
    let mut running_sum = 0.0_f64;
    for chunk in scores.chunks(block_size) {
        let block_max = max_score(chunk);
        let new_max = running_max.max(block_max);
        if new_max == f64::NEG_INFINITY {
            continue;
        }
        running_sum *= rescale_factor(running_max, new_max);
        running_sum += chunk.iter().map(|&x| (x - new_max).exp()).sum::<f64>();
        running_max = new_max;
    }
    if running_max == f64::NEG_INFINITY {
        return Err(SoftmaxError::AllMasked { len: scores.len() });
    }

    let output: Array1<f64> =
        scores.iter().map(|&x| (x - running_max).exp() / running_sum).collect();
    Ok(SoftmaxOutcome::from_parts(output, running_max + running_sum.ln()))
}

/// Neumaier running sum: Kahan summation that also handles an addend
/// larger than the running total.
#[derive(Debug, Clone, Copy, Default)]
struct NeumaierSum {
    sum: f64,
    carry: f64,
}

impl NeumaierSum {
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.carry += (self.sum - t) + x;
        } else {
            self.carry += (x - t) + self.sum;
        }
        self.sum = t;
    }

    fn value(&self) -> f64 {
        self.sum + self.carry
    }
}

/// Single-block softmax with a compensated normalizer.
///
/// Computes `m = max(scores)`, `l = ∑ exp(xᵢ − m)` with [`NeumaierSum`],
/// then `exp(xᵢ − m) / l` and `lse = m + ln l`.
///
/// Errors
/// ------
/// - Everything [`validate_scores`] reports.
/// - `AllMasked { len }` when every score is `-inf`.
pub fn compensated_softmax(scores: &[f64]) -> SmResult<SoftmaxOutcome> {
    validate_scores(scores)?;
    let m = max_score(scores);
    if m == f64::NEG_INFINITY {
        return Err(SoftmaxError::AllMasked { len: scores.len() });
    }

    let shifted: Vec<f64> = scores.iter().map(|&x| (x - m).exp()).collect();
    let mut total = NeumaierSum::default();
    for &e in &shifted {
        total.add(e);
    }
    let l = total.value();
    let output: Array1<f64> = shifted.iter().map(|&e| e / l).collect();
    Ok(SoftmaxOutcome::from_parts(output, m + l.ln()))
}
