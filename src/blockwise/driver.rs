//! blockwise::driver — split a score vector into blocks and accumulate.
//!
//! Purpose
//! -------
//! Provide the end-to-end entry point most callers want: take a full score
//! vector (and optionally a value matrix), split it into blocks of
//! `block_size`, run the stable block softmax on each block, and combine the
//! block results with the online accumulator. The answer equals the one-shot
//! softmax of the whole vector up to rounding, whatever the block size.
//!
//! Key behaviors
//! -------------
//! - [`BlockwiseSoftmax::run`] returns the full softmax output and lse.
//! - [`BlockwiseSoftmax::run_weighted`] returns `softmax(scores)ᵀ · V`
//!   without ever materializing the full probability vector in one block.
//! - With `parallel = true`, per-block states are computed on the rayon
//!   pool and combined with [`par_reduce`]; otherwise blocks are folded in
//!   order.
//! - With the `obs_slog` feature and `verbose = true`, sequential runs
//!   emit one log record per block with its offset, length, block lse,
//!   and running lse.
//!
//! Invariants & assumptions
//! ------------------------
//! - The whole input is validated up front, so error indices refer to the
//!   full vector, not to a block.
//! - Fully masked blocks are merged as zero-mass blocks; only the final
//!   read-out applies the configured [`MaskPolicy`].
//!
//! Testing notes
//! -------------
//! - Unit tests here cover sequential/parallel agreement, block-size
//!   independence, masking, and shape errors. Broader scenarios live in
//!   `tests/integration_blockwise_pipeline.rs`.

use ndarray::{ArrayView2, s};
use rayon::prelude::*;

use crate::{
    blockwise::options::BlockwiseOptions,
    softmax::{
        accumulator::AccumulatorState,
        block::{SoftmaxOutcome, compute_block_softmax_with},
        errors::{SmResult, SoftmaxError},
        mask::MaskPolicy,
        reduce::par_reduce,
        validation::validate_scores,
        weighted::{WeightedOutcome, WeightedState, weighted_block},
    },
};

#[cfg(feature = "obs_slog")]
use crate::blockwise::logging::term_logger;

/// BlockwiseSoftmax — blockwise softmax over a full score vector.
///
/// Holds a validated [`BlockwiseOptions`]; the driver itself is stateless
/// between calls and can be shared across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockwiseSoftmax {
    opts: BlockwiseOptions,
}

impl BlockwiseSoftmax {
    pub fn new(opts: BlockwiseOptions) -> Self {
        BlockwiseSoftmax { opts }
    }

    pub fn options(&self) -> &BlockwiseOptions {
        &self.opts
    }

    /// Softmax of `scores`, computed block by block.
    ///
    /// Parameters
    /// ----------
    /// - `scores`: `&[f64]`
    ///   Non-empty, no NaN, no `+inf`; `-inf` entries are masked.
    ///
    /// Returns
    /// -------
    /// `SmResult<SoftmaxOutcome>`
    ///   Output of length `scores.len()` summing to one, and the global lse.
    ///
    /// Errors
    /// ------
    /// - `EmptyScores`, `NaNScore { index }`, `PositiveInfinity { index }`
    ///   from input validation.
    /// - `AllMasked { len }` when every score is `-inf` and the mask policy
    ///   is `MaskPolicy::Error`.
    ///
    /// Examples
    /// --------
    /// ```rust
    /// use streaming_softmax::blockwise::{BlockwiseOptions, BlockwiseSoftmax};
    /// use streaming_softmax::softmax::mask::MaskPolicy;
    ///
    /// let opts = BlockwiseOptions::new(1, MaskPolicy::Error, false, false).unwrap();
    /// let outcome = BlockwiseSoftmax::new(opts).run(&[1000.0, 1000.0]).unwrap();
    /// assert!((outcome.output()[0] - 0.5).abs() < 1e-12);
    /// assert!((outcome.lse() - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
    /// ```
    pub fn run(&self, scores: &[f64]) -> SmResult<SoftmaxOutcome> {
        validate_scores(scores)?;
        let state = if self.opts.parallel {
            par_reduce(self.block_states(scores)?)?
        } else {
            self.fold_blocks(scores)?
        };
        state.finalize_with(self.opts.mask_policy)
    }

    /// Softmax-weighted sum of the rows of `values`.
    ///
    /// Parameters
    /// ----------
    /// - `scores`: `&[f64]`
    ///   Same requirements as [`run`](Self::run).
    /// - `values`: `ArrayView2<f64>`
    ///   `n × d` matrix with `n = scores.len()`.
    ///
    /// Returns
    /// -------
    /// `SmResult<WeightedOutcome>`
    ///   `∑ᵢ softmax(scores)ᵢ · values[i, ..]` (length `d`) and the global
    ///   lse.
    ///
    /// Errors
    /// ------
    /// - Everything [`run`](Self::run) reports (`AllMasked.len` is `d`).
    /// - `ValueShapeMismatch { rows, scores }` when the row count differs
    ///   from the number of scores.
    pub fn run_weighted(
        &self, scores: &[f64], values: ArrayView2<'_, f64>,
    ) -> SmResult<WeightedOutcome> {
        validate_scores(scores)?;
        if values.nrows() != scores.len() {
            return Err(SoftmaxError::ValueShapeMismatch {
                rows: values.nrows(),
                scores: scores.len(),
            });
        }
        let size = self.opts.block_size;
        let weighted_state = |k: usize, chunk: &[f64]| -> SmResult<WeightedState> {
            let block = compute_block_softmax_with(chunk, MaskPolicy::ZeroOutput)?;
            let start = k * size;
            let rows = values.slice(s![start..start + chunk.len(), ..]);
            let (output, lse) = weighted_block(&block, rows)?;
            WeightedState::initial().merge(output.view(), lse)
        };

        let state = if self.opts.parallel {
            let states = scores
                .par_chunks(size)
                .enumerate()
                .map(|(k, chunk)| weighted_state(k, chunk))
                .collect::<SmResult<Vec<_>>>()?;
            par_reduce(states)?
        } else {
            let mut state = WeightedState::initial();
            for (k, chunk) in scores.chunks(size).enumerate() {
                state = state.combine(weighted_state(k, chunk)?)?;
            }
            state
        };

        state.finalize_with(self.opts.mask_policy)
    }

    /// One independent accumulator state per block, each placed at its
    /// block offset. Combining them in any order yields the full softmax.
    ///
    /// Errors
    /// ------
    /// - Input validation errors, as in [`run`](Self::run).
    pub fn block_states(&self, scores: &[f64]) -> SmResult<Vec<AccumulatorState>> {
        validate_scores(scores)?;
        let size = self.opts.block_size;
        scores
            .par_chunks(size)
            .enumerate()
            .map(|(k, chunk)| {
                let block = compute_block_softmax_with(chunk, MaskPolicy::ZeroOutput)?;
                AccumulatorState::initial().merge_at(k * size, &block.output().to_vec(), block.lse())
            })
            .collect()
    }

    // ---- Helper Methods ----

    fn fold_blocks(&self, scores: &[f64]) -> SmResult<AccumulatorState> {
        #[cfg(feature = "obs_slog")]
        let logger = self.opts.verbose.then(term_logger);

        let mut state = AccumulatorState::initial();
        for chunk in scores.chunks(self.opts.block_size) {
            let block = compute_block_softmax_with(chunk, MaskPolicy::ZeroOutput)?;
            #[cfg(feature = "obs_slog")]
            let offset = state.next_offset();
            state = state.merge_outcome(&block)?;

            #[cfg(feature = "obs_slog")]
            if let Some(log) = &logger {
                slog::info!(log, "block merged";
                    "offset" => offset,
                    "len" => chunk.len(),
                    "block_lse" => block.lse(),
                    "running_lse" => state.lse()
                );
            }
        }
        Ok(state)
    }
}
