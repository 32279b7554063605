//! Integration tests for the blockwise softmax pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path: score validation, per-block stable
//!   softmax, online accumulation, and read-out, through both the public
//!   free functions and the `BlockwiseSoftmax` driver.
//! - Exercise realistic magnitudes (attention logits in the hundreds to
//!   thousands) where naive exponentiation overflows.
//!
//! Coverage
//! --------
//! - `softmax::block`: `compute_block_softmax` as the one-shot reference.
//! - `softmax::accumulator`: `accumulator_identity`, `accumulator_merge`,
//!   out-of-order and non-contiguous placement.
//! - `softmax::weighted`: blockwise attention outputs.
//! - `softmax::reference`: agreement with the two-pass baseline.
//! - `blockwise`: driver runs across partition sizes and execution modes.
//!
//! Exclusions
//! ----------
//! - Error-variant details of individual building blocks, which are covered
//!   by unit tests.
//! - Python bindings, which are exercised from Python.
use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array2, s};
use streaming_softmax::{
    blockwise::{BlockwiseOptions, BlockwiseSoftmax, blockwise_softmax},
    softmax::{
        AccumulatorState, MaskPolicy, SoftmaxOutcome, WeightedState, accumulator_identity,
        accumulator_merge, compute_block_softmax, two_pass_softmax, weighted_block,
    },
};

/// Deterministic, irregular scores spread over `±scale`.
fn logits(n: usize, scale: f64) -> Vec<f64> {
    (0..n).map(|i| ((i as f64 * 0.618_033_988_75).fract() * 2.0 - 1.0) * scale).collect()
}

fn assert_outcomes_close(got: &SoftmaxOutcome, want: &SoftmaxOutcome, tol: f64) {
    assert_eq!(got.len(), want.len());
    assert_relative_eq!(got.lse(), want.lse(), max_relative = 1e-12);
    for (g, w) in got.output().iter().zip(want.output()) {
        assert_abs_diff_eq!(*g, *w, epsilon = tol);
    }
}

fn options(block_size: usize) -> BlockwiseOptions {
    BlockwiseOptions::new(block_size, MaskPolicy::Error, false, false).expect("positive size")
}

#[test]
// Purpose
// -------
// Verify partition independence through the free-function API.
//
// Given
// -----
// - 40 logits in ±50, split into blocks of 1, 2, 5, and 40.
// - Each block computed with `compute_block_softmax` and folded with
//   `accumulator_merge` starting from `accumulator_identity`.
//
// Expect
// ------
// - Every partition reproduces the one-shot softmax within 1e-12.
fn free_function_merge_is_partition_independent() {
    // Arrange
    let scores = logits(40, 50.0);
    let expected = compute_block_softmax(&scores).expect("finite");

    for block_size in [1, 2, 5, scores.len()] {
        // Act
        let mut state = accumulator_identity();
        for chunk in scores.chunks(block_size) {
            let block = compute_block_softmax(chunk).expect("finite chunk");
            state = accumulator_merge(state, &block.output().to_vec(), block.lse())
                .expect("valid block");
        }
        let got = state.finalize().expect("mass accumulated");

        // Assert
        assert_outcomes_close(&got, &expected, 1e-12);
    }
}

#[test]
// Purpose
// -------
// Verify order independence when blocks arrive last-to-first.
//
// Given
// -----
// - 23 logits in ±200, blocks of 5 merged in reverse with explicit offsets.
//
// Expect
// ------
// - Output in positional order equal to the one-shot softmax.
fn reversed_merge_order_gives_same_result() {
    // Arrange
    let scores = logits(23, 200.0);
    let expected = compute_block_softmax(&scores).expect("finite");
    let blocks: Vec<(usize, SoftmaxOutcome)> = scores
        .chunks(5)
        .enumerate()
        .map(|(k, chunk)| (k * 5, compute_block_softmax(chunk).expect("finite chunk")))
        .collect();

    // Act
    let got = blocks
        .iter()
        .rev()
        .try_fold(AccumulatorState::initial(), |state, (offset, block)| {
            state.merge_at(*offset, &block.output().to_vec(), block.lse())
        })
        .and_then(AccumulatorState::finalize)
        .expect("disjoint blocks");

    // Assert
    assert_outcomes_close(&got, &expected, 1e-12);
}

#[test]
// Purpose
// -------
// Verify non-contiguous partitions (even and odd positions).
//
// Given
// -----
// - 16 logits in ±30; block A holds even positions, block B odd ones.
//
// Expect
// ------
// - The merged output matches the one-shot softmax position by position.
fn interleaved_blocks_reassemble_in_position_order() {
    // Arrange
    let scores = logits(16, 30.0);
    let expected = compute_block_softmax(&scores).expect("finite");
    let evens: Vec<usize> = (0..16).step_by(2).collect();
    let odds: Vec<usize> = (1..16).step_by(2).collect();
    let pick = |idx: &[usize]| idx.iter().map(|&i| scores[i]).collect::<Vec<f64>>();
    let block_a = compute_block_softmax(&pick(&evens)).expect("finite");
    let block_b = compute_block_softmax(&pick(&odds)).expect("finite");

    // Act
    let got = AccumulatorState::initial()
        .merge_indexed(&odds, &block_b.output().to_vec(), block_b.lse())
        .and_then(|s| s.merge_indexed(&evens, &block_a.output().to_vec(), block_a.lse()))
        .and_then(AccumulatorState::finalize)
        .expect("disjoint positions");

    // Assert
    assert_outcomes_close(&got, &expected, 1e-12);
}

#[test]
// Purpose
// -------
// Check large-magnitude stability with one dominant element.
//
// Given
// -----
// - Scores `[1, 2, 3, 4, 5] × c` for `c ∈ {100, 1000}`, blocks of 2.
//
// Expect
// ------
// - All outputs finite, the last element ≈ 1 and the others ≈ 0.
fn large_magnitudes_stay_finite_and_concentrate() {
    for c in [100.0, 1000.0] {
        // Arrange
        let scores: Vec<f64> = (1..=5).map(|i| i as f64 * c).collect();

        // Act
        let got = blockwise_softmax(&scores, &options(2)).expect("finite");

        // Assert
        assert!(got.lse().is_finite());
        assert!(got.output().iter().all(|p| p.is_finite()));
        assert_abs_diff_eq!(got.output()[4], 1.0, epsilon = 1e-12);
        assert!(got.output().iter().take(4).all(|&p| p < 1e-40));
    }
}

#[test]
// Purpose
// -------
// Reproduce the concrete two-element scenario through the driver.
//
// Given
// -----
// - `v = [1000, 1000 + ln 2]` with block sizes 1 and 2.
//
// Expect
// ------
// - Output ≈ [1/3, 2/3] and lse = 1000 + ln 3 in both cases.
fn ln2_scenario_through_driver() {
    let scores = [1000.0, 1000.0 + 2.0_f64.ln()];
    for block_size in [1, 2] {
        let got = blockwise_softmax(&scores, &options(block_size)).expect("finite");
        assert_abs_diff_eq!(got.output()[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(got.output()[1], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(got.lse(), 1000.0 + 3.0_f64.ln(), epsilon = 1e-9);
    }
}

#[test]
// Purpose
// -------
// Cross-check the single-pass driver against the two-pass baseline.
//
// Given
// -----
// - 300 logits in ±700, block sizes 7 and 64, sequential and parallel.
//
// Expect
// ------
// - Identical results within 1e-12.
fn driver_agrees_with_two_pass_baseline() {
    let scores = logits(300, 700.0);
    for block_size in [7, 64] {
        let baseline = two_pass_softmax(&scores, block_size).expect("finite");
        for parallel in [false, true] {
            let opts = BlockwiseOptions::new(block_size, MaskPolicy::Error, parallel, false)
                .expect("positive size");
            let got = BlockwiseSoftmax::new(opts).run(&scores).expect("finite");
            assert_outcomes_close(&got, &baseline, 1e-12);
        }
    }
}

#[test]
// Purpose
// -------
// Verify blockwise attention built by hand matches the driver and the
// direct product.
//
// Given
// -----
// - 30 logits in ±300 and a 30×8 value matrix, blocks of 8.
//
// Expect
// ------
// - Hand-merged `WeightedState`, `run_weighted`, and `Vᵀ softmax(v)` agree
//   within 1e-10.
fn blockwise_attention_matches_direct_product() {
    // Arrange
    let scores = logits(30, 300.0);
    let values = Array2::from_shape_fn((30, 8), |(i, j)| ((i * 7 + j * 3) % 11) as f64 * 0.5);
    let probs = compute_block_softmax(&scores).expect("finite");
    let direct = values.t().dot(probs.output());

    // Act
    let mut state = WeightedState::initial();
    for (k, chunk) in scores.chunks(8).enumerate() {
        let block = compute_block_softmax(chunk).expect("finite chunk");
        let rows = values.slice(s![k * 8..k * 8 + chunk.len(), ..]);
        let (out, lse) = weighted_block(&block, rows).expect("matching rows");
        state = state.merge(out.view(), lse).expect("same width");
    }
    let by_hand = state.finalize().expect("mass accumulated");
    let by_driver =
        BlockwiseSoftmax::new(options(8)).run_weighted(&scores, values.view()).expect("shapes");

    // Assert
    for got in [&by_hand, &by_driver] {
        assert_relative_eq!(got.lse(), probs.lse(), max_relative = 1e-12);
        for (g, w) in got.output().iter().zip(direct.iter()) {
            assert_abs_diff_eq!(*g, *w, epsilon = 1e-10);
        }
    }
}

#[test]
// Purpose
// -------
// Check masked attention rows with the zero-output policy.
//
// Given
// -----
// - A causal-style row where the last half is masked, and a row that is
//   entirely masked.
//
// Expect
// ------
// - Partially masked: masked positions exactly zero, the rest sums to one.
// - Fully masked: zeros and `lse = -inf`.
fn masked_rows_under_zero_output_policy() {
    let opts = BlockwiseOptions::new(3, MaskPolicy::ZeroOutput, false, false).expect("size");
    let driver = BlockwiseSoftmax::new(opts);
    let ninf = f64::NEG_INFINITY;

    let partial = driver.run(&[0.5, 1.5, -0.5, 2.0, ninf, ninf, ninf, ninf]).expect("mass");
    assert!(partial.output().iter().skip(4).all(|&p| p == 0.0));
    assert_abs_diff_eq!(partial.output().sum(), 1.0, epsilon = 1e-12);

    let full = driver.run(&[ninf; 7]).expect("zero policy");
    assert_eq!(full.len(), 7);
    assert!(full.output().iter().all(|&p| p == 0.0));
    assert_eq!(full.lse(), ninf);
}
