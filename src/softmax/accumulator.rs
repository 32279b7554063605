//! softmax::accumulator — online combination of per-block softmax results.
//!
//! Purpose
//! -------
//! Combine a running `(output, lse)` state with newly arrived
//! `(block_output, block_lse)` pairs so that, after the last block, the
//! state holds exactly the softmax of the full concatenated score vector
//! and its log-sum-exp, whatever the partition and whatever the merge order.
//!
//! Key behaviors
//! -------------
//! - Update the running statistic in the log domain:
//!   `new_lse = log_add_exp(lse, block_lse)`.
//! - Rescale previously accumulated output by `exp(lse − new_lse)` and the
//!   incoming block by `exp(block_lse − new_lse)`; both factors lie in
//!   `[0, 1]`, so nothing overflows.
//! - Keep the output as per-block segments. Every element of a block is
//!   only ever multiplied by a common factor, and the product of all the
//!   factors a block sees telescopes to `exp(block_lse − final_lse)`, so
//!   each segment stores its own `block_lse` and the factor is applied once
//!   on read-out. Merging is therefore O(1) in the size of earlier blocks.
//! - Track which positions of the full vector each segment covers, so
//!   blocks can arrive in any order (`merge_at`, `merge_indexed`) and whole
//!   states can be combined (`combine`) for tree reductions.
//!
//! Invariants & assumptions
//! ------------------------
//! - `lse = -inf` if and only if no mass has been accumulated.
//! - No position is covered by two segments; overlaps are rejected at the
//!   offending merge with `DuplicatePosition`.
//! - Coverage is stored as coalesced runs, so its size grows with the
//!   number of gaps, not with the largest position. A sparse index such as
//!   `1 << 40` costs one run, and the hole below it surfaces as
//!   `MissingPosition` at read-out.
//! - Block outputs are assumed to be the softmax of their block (each
//!   summing to one); the accumulator does not verify this.
//!
//! Conventions
//! -----------
//! - The state is a plain value threaded through calls: merges consume the
//!   state and return the updated one.
//! - A block with `block_lse = -inf` adds no mass. If it is empty it is a
//!   strict no-op; if it has outputs (a fully masked block) its positions
//!   are recorded so read-out still covers them, with weight zero.
//!
//! Downstream usage
//! ----------------
//! - Seed with [`AccumulatorState::initial`] (or [`accumulator_identity`]),
//!   merge every block, then call [`AccumulatorState::finalize`].
//! - Parallel callers build one state per block and reduce them with
//!   [`AccumulatorState::combine`]; see [`crate::softmax::reduce`].
//!
//! Testing notes
//! -------------
//! - Unit tests cover the identity merge, the ln 2 scenario split into
//!   single-element blocks, reversed and non-contiguous placement, masked
//!   and empty blocks, and every correspondence error.
//! - Property tests under `tests/` check partition and order independence
//!   on random inputs.

use std::collections::BTreeMap;

use ndarray::Array1;

use crate::softmax::{
    block::SoftmaxOutcome,
    errors::{SmResult, SoftmaxError},
    mask::MaskPolicy,
    numerics::{log_add_exp, rescale_factor},
    validation::validate_block,
};

/// Positions of the full vector covered by one segment.
#[derive(Debug, Clone, PartialEq)]
enum Positions {
    Contiguous { offset: usize, len: usize },
    Indexed(Vec<usize>),
}

impl Positions {
    fn len(&self) -> usize {
        match self {
            Positions::Contiguous { len, .. } => *len,
            Positions::Indexed(indices) => indices.len(),
        }
    }

    fn get(&self, i: usize) -> usize {
        match self {
            Positions::Contiguous { offset, .. } => offset + i,
            Positions::Indexed(indices) => indices[i],
        }
    }

    /// Covered positions as sorted, disjoint, coalesced half-open runs.
    ///
    /// Errors
    /// ------
    /// - `PositionOverflow` when a position end does not fit in `usize`.
    /// - `DuplicatePosition { index }` when an index repeats.
    fn runs(&self) -> SmResult<Vec<(usize, usize)>> {
        match self {
            Positions::Contiguous { offset, len } => {
                let end = offset
                    .checked_add(*len)
                    .ok_or(SoftmaxError::PositionOverflow { offset: *offset, len: *len })?;
                Ok(vec![(*offset, end)])
            }
            Positions::Indexed(indices) => {
                let mut sorted = indices.clone();
                sorted.sort_unstable();
                let mut runs: Vec<(usize, usize)> = Vec::new();
                for p in sorted {
                    let end = p
                        .checked_add(1)
                        .ok_or(SoftmaxError::PositionOverflow { offset: p, len: 1 })?;
                    match runs.last_mut() {
                        Some((_, last_end)) if *last_end > p => {
                            return Err(SoftmaxError::DuplicatePosition { index: p });
                        }
                        Some((_, last_end)) if *last_end == p => *last_end = end,
                        _ => runs.push((p, end)),
                    }
                }
                Ok(runs)
            }
        }
    }
}

/// Covered positions of the full vector, kept as disjoint runs
/// `start -> end` (half-open). Adjacent runs are coalesced, so a
/// contiguous cover is a single entry whatever the number of blocks.
#[derive(Debug, Clone, Default, PartialEq)]
struct Coverage {
    runs: BTreeMap<usize, usize>,
}

impl Coverage {
    /// First covered position inside `[start, end)`, if any.
    fn first_overlap(&self, start: usize, end: usize) -> Option<usize> {
        if let Some((_, &run_end)) = self.runs.range(..=start).next_back() {
            if run_end > start {
                return Some(start);
            }
        }
        self.runs.range(start..end).next().map(|(&run_start, _)| run_start)
    }

    /// Add `[start, end)`; the caller has checked it is uncovered.
    fn insert(&mut self, mut start: usize, mut end: usize) {
        if let Some((&prev_start, &prev_end)) = self.runs.range(..=start).next_back() {
            if prev_end == start {
                self.runs.remove(&prev_start);
                start = prev_start;
            }
        }
        if let Some(next_end) = self.runs.remove(&end) {
            end = next_end;
        }
        self.runs.insert(start, end);
    }

    /// Claim every run, or none of them if any overlaps.
    fn claim_all(&mut self, runs: &[(usize, usize)]) -> SmResult<()> {
        if let Some(index) = runs.iter().find_map(|&(s, e)| self.first_overlap(s, e)) {
            return Err(SoftmaxError::DuplicatePosition { index });
        }
        for &(s, e) in runs {
            self.insert(s, e);
        }
        Ok(())
    }

    /// One past the largest covered position.
    fn end(&self) -> usize {
        self.runs.last_key_value().map_or(0, |(_, &e)| e)
    }

    /// First uncovered position below [`end`](Self::end).
    fn first_gap(&self) -> Option<usize> {
        let (&start, &end) = self.runs.first_key_value()?;
        if start > 0 {
            Some(0)
        } else if self.runs.len() > 1 {
            Some(end)
        } else {
            None
        }
    }

    fn as_runs(&self) -> Vec<(usize, usize)> {
        self.runs.iter().map(|(&s, &e)| (s, e)).collect()
    }
}

/// One merged block: its normalized output, where it sits, and its lse.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    positions: Positions,
    values: Array1<f64>,
    lse: f64,
}

/// AccumulatorState — running result of an online softmax.
///
/// Fields
/// ------
/// - `segments`: per-block normalized outputs with their positions and
///   their own block lse.
/// - `lse`: log-sum-exp over every score merged so far (`-inf` when
///   empty).
/// - `coverage`: covered positions of the full vector as disjoint runs.
/// - `next_offset`: position where [`merge`](Self::merge) places the next
///   block.
///
/// Invariants
/// ----------
/// - `lse == log_add_exp` over the `lse` of every segment.
/// - `coverage` holds exactly the positions some segment covers.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorState {
    segments: Vec<Segment>,
    lse: f64,
    coverage: Coverage,
    next_offset: usize,
}

impl Default for AccumulatorState {
    fn default() -> Self {
        Self::initial()
    }
}

impl AccumulatorState {
    /// Identity state: no output and `lse = -inf`.
    pub fn initial() -> Self {
        AccumulatorState {
            segments: Vec::new(),
            lse: f64::NEG_INFINITY,
            coverage: Coverage::default(),
            next_offset: 0,
        }
    }

    /// Running log-sum-exp over every score merged so far.
    pub fn lse(&self) -> f64 {
        self.lse
    }

    /// `true` while no mass has been accumulated.
    pub fn is_identity(&self) -> bool {
        self.lse == f64::NEG_INFINITY
    }

    /// Number of positions covered by merged blocks.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.positions.len()).sum()
    }

    /// `true` when no block has been recorded.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of recorded blocks.
    pub fn num_blocks(&self) -> usize {
        self.segments.len()
    }

    /// Number of disjoint runs of covered positions. A gap-free cover is a
    /// single run however many blocks produced it.
    pub fn coverage_runs(&self) -> usize {
        self.coverage.runs.len()
    }

    /// Position at which the next [`merge`](Self::merge) places its block.
    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    /// Merge a block placed right after the furthest position seen so far.
    ///
    /// Parameters
    /// ----------
    /// - `block_output`: `&[f64]`
    ///   Softmax output of the block (sums to one over the block).
    /// - `block_lse`: `f64`
    ///   Log-sum-exp of the block's raw scores; `-inf` for an empty or
    ///   fully masked block.
    ///
    /// Returns
    /// -------
    /// `SmResult<AccumulatorState>`
    ///   The updated state with `lse = log_add_exp(self.lse, block_lse)`.
    ///
    /// Errors
    /// ------
    /// - Everything [`validate_block`] reports (`EmptyBlockWithFiniteLse`,
    ///   `InvalidBlockLse`, `InfiniteBlockLse`, `InvalidBlockOutput`).
    ///
    /// Examples
    /// --------
    /// ```rust
    /// use streaming_softmax::softmax::accumulator::AccumulatorState;
    ///
    /// let state = AccumulatorState::initial()
    ///     .merge(&[1.0], 1000.0)
    ///     .and_then(|s| s.merge(&[1.0], 1000.0 + 2.0_f64.ln()))
    ///     .unwrap();
    /// let outcome = state.finalize().unwrap();
    /// assert!((outcome.output()[1] - 2.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn merge(self, block_output: &[f64], block_lse: f64) -> SmResult<Self> {
        let offset = self.next_offset;
        self.merge_at(offset, block_output, block_lse)
    }

    /// Merge a contiguous block whose first element sits at `offset` in the
    /// full vector.
    ///
    /// Errors
    /// ------
    /// - Everything [`merge`](Self::merge) reports.
    /// - `DuplicatePosition { index }` if the block overlaps a merged block.
    /// - `PositionOverflow` if `offset + block_output.len()` overflows.
    pub fn merge_at(self, offset: usize, block_output: &[f64], block_lse: f64) -> SmResult<Self> {
        let positions = Positions::Contiguous { offset, len: block_output.len() };
        self.push_block(positions, block_output, block_lse)
    }

    /// Merge a block whose elements sit at arbitrary (possibly
    /// non-contiguous) positions of the full vector.
    ///
    /// Errors
    /// ------
    /// - Everything [`merge`](Self::merge) reports.
    /// - `IndexCountMismatch` if `indices.len() != block_output.len()`.
    /// - `DuplicatePosition { index }` if a position repeats or overlaps a
    ///   merged block.
    /// - `PositionOverflow` if an index equals `usize::MAX`.
    pub fn merge_indexed(
        self, indices: &[usize], block_output: &[f64], block_lse: f64,
    ) -> SmResult<Self> {
        if indices.len() != block_output.len() {
            return Err(SoftmaxError::IndexCountMismatch {
                indices: indices.len(),
                outputs: block_output.len(),
            });
        }
        self.push_block(Positions::Indexed(indices.to_vec()), block_output, block_lse)
    }

    /// Merge a [`SoftmaxOutcome`] at the next contiguous position.
    pub fn merge_outcome(self, outcome: &SoftmaxOutcome) -> SmResult<Self> {
        let output = outcome.output().to_vec();
        self.merge(&output, outcome.lse())
    }

    /// Combine two states covering disjoint positions.
    ///
    /// The result is the state obtained by merging every block of `other`
    /// into `self`; because segments carry their own lse, no element needs
    /// to be touched. Combination is associative and commutative up to
    /// floating-point rounding of the running lse.
    ///
    /// Errors
    /// ------
    /// - `DuplicatePosition { index }` if the two states overlap.
    pub fn combine(mut self, other: AccumulatorState) -> SmResult<Self> {
        self.coverage.claim_all(&other.coverage.as_runs())?;
        self.lse = log_add_exp(self.lse, other.lse);
        self.next_offset = self.next_offset.max(other.next_offset);
        self.segments.extend(other.segments);
        Ok(self)
    }

    /// Current normalized output of each recorded block, in merge order,
    /// paired with the positions it covers.
    ///
    /// This is the accumulated output viewed against the running lse: each
    /// block's values scaled by `exp(block_lse − lse)`.
    pub fn block_outputs(&self) -> Vec<(Vec<usize>, Array1<f64>)> {
        self.segments
            .iter()
            .map(|segment| {
                let factor = rescale_factor(segment.lse, self.lse);
                let positions = (0..segment.positions.len()).map(|i| segment.positions.get(i));
                (positions.collect(), &segment.values * factor)
            })
            .collect()
    }

    /// Read out the combined output, rejecting a state with no mass.
    ///
    /// Equivalent to [`finalize_with`](Self::finalize_with) with
    /// [`MaskPolicy::Error`].
    pub fn finalize(self) -> SmResult<SoftmaxOutcome> {
        self.finalize_with(MaskPolicy::Error)
    }

    /// Read out the combined output as one flat vector in positional order.
    ///
    /// Returns
    /// -------
    /// `SmResult<SoftmaxOutcome>`
    ///   Output of length `max position + 1` and the final lse.
    ///
    /// Errors
    /// ------
    /// - `MissingPosition { index }` for the first position no block
    ///   covers.
    /// - `AllMasked { len }` when no mass was accumulated and `policy` is
    ///   `MaskPolicy::Error`; under `MaskPolicy::ZeroOutput` the output is
    ///   all zeros with `lse = -inf`.
    pub fn finalize_with(self, policy: MaskPolicy) -> SmResult<SoftmaxOutcome> {
        if let Some(index) = self.coverage.first_gap() {
            return Err(SoftmaxError::MissingPosition { index });
        }
        let total = self.coverage.end();
        if self.is_identity() {
            return match policy {
                MaskPolicy::Error => Err(SoftmaxError::AllMasked { len: total }),
                MaskPolicy::ZeroOutput => {
                    Ok(SoftmaxOutcome::from_parts(Array1::zeros(total), f64::NEG_INFINITY))
                }
            };
        }

        let mut output = Array1::<f64>::zeros(total);
        for segment in &self.segments {
            let factor = rescale_factor(segment.lse, self.lse);
            for (i, &v) in segment.values.iter().enumerate() {
                output[segment.positions.get(i)] = v * factor;
            }
        }
        Ok(SoftmaxOutcome::from_parts(output, self.lse))
    }

    // ---- Internals ----

    fn push_block(mut self, positions: Positions, values: &[f64], lse: f64) -> SmResult<Self> {
        validate_block(values, lse)?;
        if values.is_empty() {
            // Only reachable with lse = -inf: an empty block.
            return Ok(self);
        }
        let runs = positions.runs()?;
        self.coverage.claim_all(&runs)?;
        let end = runs.last().map_or(0, |&(_, e)| e);
        self.next_offset = self.next_offset.max(end);
        self.lse = log_add_exp(self.lse, lse);
        self.segments.push(Segment { positions, values: Array1::from(values.to_vec()), lse });
        Ok(self)
    }
}

/// Identity accumulator state (`lse = -inf`, no output).
pub fn accumulator_identity() -> AccumulatorState {
    AccumulatorState::initial()
}

/// Merge `(block_output, block_lse)` into `state` at the next contiguous
/// position. See [`AccumulatorState::merge`].
pub fn accumulator_merge(
    state: AccumulatorState, block_output: &[f64], block_lse: f64,
) -> SmResult<AccumulatorState> {
    state.merge(block_output, block_lse)
}
