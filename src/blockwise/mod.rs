//! blockwise — drive the softmax core over a full score vector.
//!
//! Purpose
//! -------
//! Offer the high-level API for callers that hold the whole input: choose a
//! block size and mask policy once ([`BlockwiseOptions`]) and let
//! [`BlockwiseSoftmax`] split, compute, and combine the blocks.
//!
//! Conventions
//! -----------
//! - All numerical work is delegated to [`crate::softmax`]; this layer
//!   only partitions input, schedules blocks (sequentially or on the
//!   rayon pool), and optionally logs progress behind `obs_slog`.

pub mod driver;
#[cfg(feature = "obs_slog")]
pub mod logging;
pub mod options;

pub use self::driver::BlockwiseSoftmax;
pub use self::options::{BlockwiseOptions, DEFAULT_BLOCK_SIZE};

/// Blockwise softmax of `scores` with the given options.
///
/// Shorthand for `BlockwiseSoftmax::new(*opts).run(scores)`.
pub fn blockwise_softmax(
    scores: &[f64], opts: &BlockwiseOptions,
) -> crate::softmax::SmResult<crate::softmax::SoftmaxOutcome> {
    BlockwiseSoftmax::new(*opts).run(scores)
}
