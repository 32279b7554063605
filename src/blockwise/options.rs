//! blockwise::options — configuration for the blockwise softmax driver.
//!
//! Purpose
//! -------
//! Hold the knobs that control how [`BlockwiseSoftmax`] partitions its input
//! and how it treats fully masked data, in one validated value that callers
//! build once and reuse.
//!
//! Invariants & assumptions
//! ------------------------
//! - `block_size ≥ 1`; [`BlockwiseOptions::new`] rejects zero with
//!   `SoftmaxError::InvalidBlockSize`.
//! - `verbose` only has an effect when the crate is built with the
//!   `obs_slog` feature; otherwise it is accepted and ignored.
//!
//! [`BlockwiseSoftmax`]: crate::blockwise::driver::BlockwiseSoftmax

use crate::softmax::{
    errors::{SmResult, SoftmaxError},
    mask::MaskPolicy,
};

/// Block size used by [`BlockwiseOptions::default`].
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// BlockwiseOptions — partitioning, masking, and execution policy.
///
/// Fields
/// ------
/// - `block_size`: `usize`
///   Number of scores per block; the last block may be shorter.
/// - `mask_policy`: [`MaskPolicy`]
///   What to do when the whole input is masked (`-inf`).
/// - `parallel`: `bool`
///   Compute per-block states on the rayon pool and reduce them in
///   parallel instead of folding sequentially.
/// - `verbose`: `bool`
///   Emit one terminal log record per merged block (requires `obs_slog`).
///
/// Notes
/// -----
/// - `Default` gives `block_size = 64`, `MaskPolicy::Error`, sequential,
///   quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockwiseOptions {
    pub block_size: usize,
    pub mask_policy: MaskPolicy,
    pub parallel: bool,
    pub verbose: bool,
}

impl BlockwiseOptions {
    /// Construct validated options.
    ///
    /// Errors
    /// ------
    /// - `SoftmaxError::InvalidBlockSize`
    ///   If `block_size == 0`.
    ///
    /// Examples
    /// --------
    /// ```rust
    /// # use streaming_softmax::blockwise::options::BlockwiseOptions;
    /// # use streaming_softmax::softmax::mask::MaskPolicy;
    /// let opts = BlockwiseOptions::new(16, MaskPolicy::ZeroOutput, false, false).unwrap();
    /// assert_eq!(opts.block_size, 16);
    /// assert!(BlockwiseOptions::new(0, MaskPolicy::Error, false, false).is_err());
    /// ```
    pub fn new(
        block_size: usize, mask_policy: MaskPolicy, parallel: bool, verbose: bool,
    ) -> SmResult<Self> {
        if block_size == 0 {
            return Err(SoftmaxError::InvalidBlockSize { size: block_size });
        }
        Ok(BlockwiseOptions { block_size, mask_policy, parallel, verbose })
    }

    /// Same options with a different block size, validated.
    pub fn with_block_size(self, block_size: usize) -> SmResult<Self> {
        BlockwiseOptions::new(block_size, self.mask_policy, self.parallel, self.verbose)
    }
}

impl Default for BlockwiseOptions {
    fn default() -> Self {
        BlockwiseOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            mask_policy: MaskPolicy::default(),
            parallel: false,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Pin the documented defaults.
    //
    // Given
    // -----
    // - `BlockwiseOptions::default()`.
    //
    // Expect
    // ------
    // - Block size 64, error-on-mask, sequential, quiet.
    fn default_options_match_documented_values() {
        let opts = BlockwiseOptions::default();
        assert_eq!(opts.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(opts.mask_policy, MaskPolicy::Error);
        assert!(!opts.parallel);
        assert!(!opts.verbose);
    }

    #[test]
    // Purpose
    // -------
    // Ensure a zero block size is rejected by both constructors.
    //
    // Given
    // -----
    // - `block_size = 0`.
    //
    // Expect
    // ------
    // - `InvalidBlockSize { size: 0 }`.
    fn zero_block_size_is_rejected() {
        let expected = Err(SoftmaxError::InvalidBlockSize { size: 0 });
        assert_eq!(BlockwiseOptions::new(0, MaskPolicy::Error, true, false), expected);
        assert_eq!(BlockwiseOptions::default().with_block_size(0), expected);
        assert_eq!(BlockwiseOptions::default().with_block_size(3).map(|o| o.block_size), Ok(3));
    }
}
