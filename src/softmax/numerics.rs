//! Log-domain helpers shared by the block softmax and the accumulators.
//!
//! Every exponential in this crate goes through one of the helpers below,
//! which only ever evaluate `exp` on a non-positive argument:
//!
//! - [`log_add_exp(a, b)`]: `ln(exp(a) + exp(b))` as
//!   `max(a, b) + ln_1p(exp(-|a - b|))`, with `-inf` treated as the
//!   identity element.
//! - [`rescale_factor(lse, new_lse)`]: `exp(lse - new_lse)` for
//!   `lse ≤ new_lse`, defined to be `0.0` when `lse = -inf`.
//! - [`max_score`]: running maximum with `-inf` as the empty value.
//!
//! # Provided constants
//! - [`SUM_TOL_PER_ELEMENT`]: relative tolerance per element on the
//!   sum-to-one guarantee of a block softmax.

/// Relative tolerance per element on `sum(output) = 1`.
///
/// A block of length `n` is guaranteed to satisfy
/// `|sum(output) - 1| ≤ n · SUM_TOL_PER_ELEMENT`.
pub const SUM_TOL_PER_ELEMENT: f64 = 1e-6;

/// Numerically stable `ln(exp(a) + exp(b))`.
///
/// `-inf` on either side is the identity, so the empty accumulator
/// (`lse = -inf`) combines with a block by simply adopting the block's lse,
/// and two empty operands stay `-inf`. The exponent argument `-|a - b|` is
/// never positive, so the evaluation cannot overflow.
///
/// # Parameters
/// - `a`, `b`: log-sum-exp values; finite or `-inf`. Callers reject NaN
///   and `+inf` before reaching here.
///
/// # Returns
/// - `ln(exp(a) + exp(b))` as `f64`.
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let hi = a.max(b);
    hi + (-(a - b).abs()).exp().ln_1p()
}

/// Factor by which mass normalized against `lse` must be scaled to be
/// normalized against `new_lse`.
///
/// Equal to `exp(lse - new_lse)`, which lies in `[0, 1]` whenever
/// `new_lse ≥ lse` (always the case after a [`log_add_exp`] update).
/// An `lse` of `-inf` carries no mass and yields exactly `0.0`.
#[inline]
pub fn rescale_factor(lse: f64, new_lse: f64) -> f64 {
    if lse == f64::NEG_INFINITY { 0.0 } else { (lse - new_lse).min(0.0).exp() }
}

/// Maximum of a score slice; `-inf` for an empty slice.
#[inline]
pub fn max_score(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement of `log_add_exp` with the naive formula on a safe grid.
    // - Behavior of `log_add_exp` at ±large magnitudes and with `-inf`.
    // - Range and identity cases of `rescale_factor`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check `log_add_exp` against `ln(exp(a) + exp(b))` where the naive
    // form is safe to evaluate.
    //
    // Given
    // -----
    // - A grid of (a, b) pairs in [-5, 5].
    //
    // Expect
    // ------
    // - Both forms agree to 1e-12 relative error.
    fn log_add_exp_matches_naive_formula_on_safe_grid() {
        for i in -5..=5 {
            for j in -5..=5 {
                // Arrange
                let a = i as f64 * 0.9;
                let b = j as f64 * 1.1;

                // Act
                let stable = log_add_exp(a, b);
                let naive = (a.exp() + b.exp()).ln();

                // Assert
                assert_relative_eq!(stable, naive, max_relative = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify that `log_add_exp` stays finite where the naive formula would
    // overflow.
    //
    // Given
    // -----
    // - a = 1000, b = 1000 + ln 2.
    //
    // Expect
    // ------
    // - Result equals 1000 + ln 3.
    fn log_add_exp_is_finite_for_large_arguments() {
        // Arrange
        let a = 1000.0_f64;
        let b = 1000.0 + 2.0_f64.ln();

        // Act
        let lse = log_add_exp(a, b);

        // Assert
        assert!(lse.is_finite());
        assert_relative_eq!(lse, 1000.0 + 3.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `-inf` acts as the identity element on either side.
    //
    // Given
    // -----
    // - (-inf, 3.5), (3.5, -inf), (-inf, -inf).
    //
    // Expect
    // ------
    // - 3.5, 3.5, and -inf respectively.
    fn log_add_exp_neg_infinity_is_identity() {
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 3.5), 3.5);
        assert_eq!(log_add_exp(3.5, f64::NEG_INFINITY), 3.5);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Check the range and the empty-mass case of `rescale_factor`.
    //
    // Given
    // -----
    // - lse ≤ new_lse pairs, equal pairs, and lse = -inf.
    //
    // Expect
    // ------
    // - Factors in [0, 1]; exactly 1 for equal values; exactly 0 for -inf.
    fn rescale_factor_range_and_identity() {
        assert_eq!(rescale_factor(2.0, 2.0), 1.0);
        assert_eq!(rescale_factor(f64::NEG_INFINITY, 5.0), 0.0);
        let f = rescale_factor(-700.0, 700.0);
        assert!((0.0..=1.0).contains(&f));
        assert_relative_eq!(rescale_factor(0.0, 2.0_f64.ln()), 0.5, epsilon = 1e-15);
    }
}
