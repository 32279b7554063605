//! softmax::reduce — tree and parallel reductions over accumulator states.
//!
//! Purpose
//! -------
//! Combine many independently computed block states into one. Because the
//! log-domain merge is associative and commutative, any reduction tree
//! gives the sequential left fold's answer up to rounding; this module
//! provides a balanced pairwise tree and a rayon-backed parallel reduction.
//!
//! Key behaviors
//! -------------
//! - Abstract the combining step behind [`CombineState`], implemented for
//!   both [`AccumulatorState`] and [`WeightedState`].
//! - [`reduce_tree`]: sequential balanced pairwise reduction.
//! - [`par_reduce`]: `rayon` `try_reduce` with the identity state as the
//!   neutral element; the first combining error aborts the reduction.
//!
//! Invariants & assumptions
//! ------------------------
//! - States are only ever updated through `combine`; nothing mutates a
//!   shared accumulator concurrently.
//! - An empty input reduces to the identity state.

use rayon::prelude::*;

use crate::softmax::{
    accumulator::AccumulatorState, errors::SmResult, weighted::WeightedState,
};

/// A running softmax state with an identity and an associative combine.
pub trait CombineState: Sized + Send {
    /// Neutral element: no mass, `lse = -inf`.
    fn identity() -> Self;

    /// Combine two states built from disjoint score sets.
    fn combine(self, other: Self) -> SmResult<Self>;
}

impl CombineState for AccumulatorState {
    fn identity() -> Self {
        AccumulatorState::initial()
    }

    fn combine(self, other: Self) -> SmResult<Self> {
        AccumulatorState::combine(self, other)
    }
}

impl CombineState for WeightedState {
    fn identity() -> Self {
        WeightedState::initial()
    }

    fn combine(self, other: Self) -> SmResult<Self> {
        WeightedState::combine(self, other)
    }
}

/// Reduce states with a balanced pairwise tree, sequentially.
///
/// Returns the identity for an empty input. Errors from `combine`
/// (overlapping positions, width mismatches) are propagated unchanged.
pub fn reduce_tree<S: CombineState>(mut states: Vec<S>) -> SmResult<S> {
    while states.len() > 1 {
        let mut next = Vec::with_capacity(states.len().div_ceil(2));
        let mut iter = states.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => next.push(left.combine(right)?),
                None => next.push(left),
            }
        }
        states = next;
    }
    Ok(states.pop().unwrap_or_else(S::identity))
}

/// Reduce states in parallel on the rayon thread pool.
///
/// The reduction tree is chosen by rayon; the result agrees with
/// [`reduce_tree`] and with the sequential fold within floating-point
/// tolerance.
pub fn par_reduce<S: CombineState>(states: Vec<S>) -> SmResult<S> {
    states.into_par_iter().map(Ok).try_reduce(S::identity, S::combine)
}
