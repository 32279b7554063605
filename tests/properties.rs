//! Property tests for the blockwise softmax.
//!
//! Purpose
//! -------
//! - Check the algebraic guarantees of the accumulator over random inputs:
//!   shift invariance, partition independence, merge-order independence,
//!   normalization, and zero mass on masked entries.
//! - Check agreement with a compensated-summation reference at large
//!   magnitudes.
//!
//! Exclusions
//! ----------
//! - Exact error variants and fixed scenarios, covered by unit and
//!   integration tests.
use proptest::prelude::*;
use streaming_softmax::{
    blockwise::{BlockwiseOptions, BlockwiseSoftmax},
    softmax::{
        AccumulatorState, MaskPolicy, SoftmaxOutcome, compensated_softmax, compute_block_softmax,
    },
};

fn run_blockwise(scores: &[f64], block_size: usize, parallel: bool) -> SoftmaxOutcome {
    let opts = BlockwiseOptions::new(block_size, MaskPolicy::Error, parallel, false)
        .expect("positive block size");
    BlockwiseSoftmax::new(opts).run(scores).expect("finite scores")
}

proptest! {
    #[test]
    fn prop_output_is_shift_invariant(
        v in proptest::collection::vec(-500.0_f64..500.0, 1..80),
        c in -1000.0_f64..1000.0,
    ) {
        let base = compute_block_softmax(&v).expect("finite");
        let shifted: Vec<f64> = v.iter().map(|x| x + c).collect();
        let moved = compute_block_softmax(&shifted).expect("finite");

        for (i, (a, b)) in base.output().iter().zip(moved.output()).enumerate() {
            prop_assert!((a - b).abs() < 1e-9, "output[{i}]: {a} vs {b}");
        }
        let lse_gap = (moved.lse() - (base.lse() + c)).abs();
        prop_assert!(lse_gap < 1e-9, "lse shifted by {} instead of {c}", moved.lse() - base.lse());
    }

    #[test]
    fn prop_blockwise_matches_one_shot(
        v in proptest::collection::vec(-700.0_f64..700.0, 1..120),
        block_size in 1usize..130,
        parallel in any::<bool>(),
    ) {
        let expected = compute_block_softmax(&v).expect("finite");
        let got = run_blockwise(&v, block_size, parallel);

        prop_assert_eq!(got.len(), v.len());
        let lse_rel = (got.lse() - expected.lse()).abs() / expected.lse().abs().max(1.0);
        prop_assert!(lse_rel < 1e-12, "lse {} vs {}", got.lse(), expected.lse());
        for (i, (g, w)) in got.output().iter().zip(expected.output()).enumerate() {
            prop_assert!((g - w).abs() < 1e-10, "output[{i}]: {g} vs {w}");
        }
    }

    #[test]
    fn prop_blockwise_matches_compensated_reference(
        v in proptest::collection::vec(-1000.0_f64..1000.0, 1..300),
        block_size in 1usize..64,
    ) {
        let reference = compensated_softmax(&v).expect("finite");
        let got = run_blockwise(&v, block_size, false);

        let lse_rel = (got.lse() - reference.lse()).abs() / reference.lse().abs().max(1.0);
        prop_assert!(lse_rel < 1e-12, "lse {} vs {}", got.lse(), reference.lse());
        for (i, (g, w)) in got.output().iter().zip(reference.output()).enumerate() {
            prop_assert!((g - w).abs() < 1e-10, "output[{i}]: {g} vs {w}");
        }
    }

    #[test]
    fn prop_merge_order_does_not_matter(
        v in proptest::collection::vec(-300.0_f64..300.0, 2..90),
        block_size in 1usize..20,
        rotation in 0usize..64,
        reverse in any::<bool>(),
    ) {
        let expected = compute_block_softmax(&v).expect("finite");
        let mut blocks: Vec<(usize, SoftmaxOutcome)> = v
            .chunks(block_size)
            .enumerate()
            .map(|(k, chunk)| (k * block_size, compute_block_softmax(chunk).expect("finite")))
            .collect();
        let n_blocks = blocks.len();
        blocks.rotate_left(rotation % n_blocks);
        if reverse {
            blocks.reverse();
        }

        let got = blocks
            .iter()
            .try_fold(AccumulatorState::initial(), |state, (offset, block)| {
                state.merge_at(*offset, &block.output().to_vec(), block.lse())
            })
            .and_then(AccumulatorState::finalize)
            .expect("disjoint blocks");

        for (i, (g, w)) in got.output().iter().zip(expected.output()).enumerate() {
            prop_assert!((g - w).abs() < 1e-10, "output[{i}]: {g} vs {w}");
        }
    }

    #[test]
    fn prop_output_sums_to_one(
        v in proptest::collection::vec(-1000.0_f64..1000.0, 1..200),
        block_size in 1usize..50,
    ) {
        let got = run_blockwise(&v, block_size, false);
        let sum = got.output().sum();
        prop_assert!((sum - 1.0).abs() < 1e-10, "sum = {sum}");
        prop_assert!(got.output().iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn prop_masked_entries_get_zero_mass(
        v in proptest::collection::vec(-50.0_f64..50.0, 2..60),
        mask in proptest::collection::vec(any::<bool>(), 60),
        block_size in 1usize..10,
    ) {
        // Keep position 0 unmasked so the row always carries mass.
        let scores: Vec<f64> = v
            .iter()
            .zip(&mask)
            .enumerate()
            .map(|(i, (&x, &m))| if m && i > 0 { f64::NEG_INFINITY } else { x })
            .collect();

        let got = run_blockwise(&scores, block_size, false);

        for (i, (&s, &p)) in scores.iter().zip(got.output()).enumerate() {
            if s == f64::NEG_INFINITY {
                prop_assert_eq!(p, 0.0, "masked position {} got {}", i, p);
            }
        }
        prop_assert!((got.output().sum() - 1.0).abs() < 1e-10);
    }
}
