//! softmax — numerically stable block softmax and online accumulation.
//!
//! Purpose
//! -------
//! Collect the numerical core of the crate: the stable softmax of a single
//! score block, the online accumulators that combine per-block results into
//! the softmax of the full input, and the shared validation, error, and
//! log-domain helpers they rely on.
//!
//! Key behaviors
//! -------------
//! - [`compute_block_softmax`] turns one score block into `(output, lse)`
//!   without exponentiating a positive argument.
//! - [`AccumulatorState`] merges `(block_output, block_lse)` pairs with the
//!   `log_add_exp` law and reads out the concatenated, globally normalized
//!   output; [`WeightedState`] applies the same law to
//!   probability-weighted value vectors (the flash-attention use).
//! - [`reduce_tree`] and [`par_reduce`] combine independently computed
//!   states in any tree shape.
//! - [`two_pass_softmax`] and [`compensated_softmax`] are independent
//!   baselines for tests; the latter sums with Neumaier compensation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Scores are `f64`, non-NaN, never `+inf`; `-inf` marks masked
//!   positions. Fully masked input is handled by an explicit
//!   [`MaskPolicy`], never by returning NaN.
//! - Every routine is pure: no logging, no I/O, no global state. States
//!   are plain values passed and returned.
//!
//! Conventions
//! -----------
//! - Errors use [`SoftmaxError`] and the [`SmResult`] alias; each variant
//!   is classified as `InvalidInput` or `NumericDegenerate` through
//!   [`SoftmaxError::kind`].
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own contract; property
//!   tests in `tests/` check shift, partition, and order invariance across
//!   the modules.

pub mod accumulator;
pub mod block;
pub mod errors;
pub mod mask;
pub mod numerics;
pub mod reduce;
pub mod reference;
pub mod validation;
pub mod weighted;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::accumulator::{AccumulatorState, accumulator_identity, accumulator_merge};
pub use self::block::{
    SoftmaxOutcome, compute_block_softmax, compute_block_softmax_with, log_sum_exp,
};
pub use self::errors::{ErrorKind, SmResult, SoftmaxError};
pub use self::mask::MaskPolicy;
pub use self::numerics::{log_add_exp, rescale_factor};
pub use self::reduce::{CombineState, par_reduce, reduce_tree};
pub use self::reference::{compensated_softmax, two_pass_softmax};
pub use self::weighted::{WeightedOutcome, WeightedState, weighted_block};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use streaming_softmax::softmax::prelude::*;
//
// to import the main softmax surface in a single line.

pub mod prelude {
    pub use super::accumulator::{AccumulatorState, accumulator_identity, accumulator_merge};
    pub use super::block::{SoftmaxOutcome, compute_block_softmax};
    pub use super::errors::{ErrorKind, SmResult, SoftmaxError};
    pub use super::mask::MaskPolicy;
    pub use super::weighted::{WeightedState, weighted_block};
}
