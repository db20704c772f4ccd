//! Property-based tests for losses, metrics and data preparation.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated intervals and series.

use approx::assert_relative_eq;
use proptest::prelude::*;
use tubecast::loss::{IntervalObjective, PinballPair, TubeLoss};
use tubecast::transform::{ScalingMethod, SlidingWindows};
use tubecast::utils::{mpiw, picp, winkler_score};

/// Strategy for a batch of observations with (possibly crossed) bounds.
fn interval_batch(max_len: usize) -> impl Strategy<Value = (Vec<f64>, Vec<f64>, Vec<f64>)> {
    (1..max_len).prop_flat_map(|len| {
        (
            prop::collection::vec(-50.0..50.0_f64, len),
            prop::collection::vec(-50.0..50.0_f64, len),
            prop::collection::vec(-50.0..50.0_f64, len),
        )
    })
}

/// Strategy for wind-like positive series.
fn series_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(0.0..30.0_f64, len).prop_map(|mut v| {
            // keep the range non-degenerate
            v[0] = 0.0;
            v[1] = 30.0;
            v
        })
    })
}

fn tube_params() -> impl Strategy<Value = TubeLoss> {
    (0.05..0.99_f64, 0.0..=1.0_f64, 0.0..2.0_f64)
        .prop_map(|(t, r, delta)| TubeLoss::new(t, r, delta).unwrap())
}

// ============================================================================
// Metrics
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// PICP is a fraction.
    #[test]
    fn picp_in_unit_interval((actual, lower, upper) in interval_batch(60)) {
        let p = picp(&actual, &lower, &upper).unwrap();
        prop_assert!((0.0..=1.0).contains(&p));
    }

    /// MPIW never goes negative, even with crossed bounds.
    #[test]
    fn mpiw_non_negative((_, lower, upper) in interval_batch(60)) {
        prop_assert!(mpiw(&lower, &upper).unwrap() >= 0.0);
    }

    /// Degenerate intervals have zero width.
    #[test]
    fn mpiw_zero_for_point_intervals((_, lower, _) in interval_batch(60)) {
        prop_assert_eq!(mpiw(&lower, &lower).unwrap(), 0.0);
    }

    /// Unbounded intervals cover everything.
    #[test]
    fn infinite_bounds_cover_all((actual, _, _) in interval_batch(60)) {
        let lower = vec![f64::NEG_INFINITY; actual.len()];
        let upper = vec![f64::INFINITY; actual.len()];
        prop_assert_eq!(picp(&actual, &lower, &upper).unwrap(), 1.0);
    }

    /// The Winkler score is never below the mean width.
    #[test]
    fn winkler_at_least_width((actual, lower, upper) in interval_batch(60), alpha in 0.01..0.5_f64) {
        let score = winkler_score(&actual, &lower, &upper, alpha).unwrap();
        let width = mpiw(&lower, &upper).unwrap();
        prop_assert!(score >= width - 1e-9);
    }

    /// Widening every interval cannot lower coverage.
    #[test]
    fn widening_keeps_coverage((actual, lower, upper) in interval_batch(60), pad in 0.0..10.0_f64) {
        let (lo, hi): (Vec<f64>, Vec<f64>) = lower
            .iter()
            .zip(&upper)
            .map(|(&a, &b)| (a.min(b), a.max(b)))
            .unzip();
        let wider_lo: Vec<f64> = lo.iter().map(|v| v - pad).collect();
        let wider_hi: Vec<f64> = hi.iter().map(|v| v + pad).collect();
        prop_assert!(
            picp(&actual, &wider_lo, &wider_hi).unwrap() >= picp(&actual, &lo, &hi).unwrap()
        );
    }
}

// ============================================================================
// Losses
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Tube loss is non-negative everywhere.
    #[test]
    fn tube_non_negative(loss in tube_params(), y in -20.0..20.0_f64, a in -20.0..20.0_f64, b in -20.0..20.0_f64) {
        prop_assert!(loss.value(y, a, b) >= 0.0);
    }

    /// Swapping crossed bounds does not change the loss.
    #[test]
    fn tube_order_invariant(loss in tube_params(), y in -20.0..20.0_f64, a in -20.0..20.0_f64, b in -20.0..20.0_f64) {
        assert_relative_eq!(loss.value(y, a, b), loss.value(y, b, a), epsilon = 1e-12);
    }

    /// With r = 0.5 mirroring the problem around zero leaves the loss unchanged.
    #[test]
    fn tube_symmetric_at_half(t in 0.05..0.99_f64, y in -20.0..20.0_f64, a in -20.0..20.0_f64, w in 0.0..10.0_f64) {
        let loss = TubeLoss::new(t, 0.5, 0.0).unwrap();
        let (lo, hi) = (a, a + w);
        assert_relative_eq!(loss.value(y, lo, hi), loss.value(-y, -hi, -lo), epsilon = 1e-9);
    }

    /// A larger width penalty never lowers the loss.
    #[test]
    fn tube_delta_monotone(loss in tube_params(), extra in 0.0..1.0_f64, y in -20.0..20.0_f64, a in -20.0..20.0_f64, b in -20.0..20.0_f64) {
        let heavier = loss.with_delta(loss.delta + extra);
        prop_assert!(heavier.value(y, a, b) >= loss.value(y, a, b) - 1e-12);
    }

    /// The analytic gradient matches central differences away from kinks.
    #[test]
    fn tube_gradient_matches_finite_difference(loss in tube_params(), y in -5.0..5.0_f64, a in -5.0..5.0_f64, w in 0.5..5.0_f64) {
        let (lo, hi) = (a, a + w);
        let mid = loss.point(lo, hi);
        let h = 1e-6;
        prop_assume!((y - lo).abs() > 1e-3 && (y - hi).abs() > 1e-3 && (y - mid).abs() > 1e-3);

        let (g_lo, g_hi) = loss.gradient(y, lo, hi);
        let num_lo = (loss.value(y, lo + h, hi) - loss.value(y, lo - h, hi)) / (2.0 * h);
        let num_hi = (loss.value(y, lo, hi + h) - loss.value(y, lo, hi - h)) / (2.0 * h);
        assert_relative_eq!(g_lo, num_lo, epsilon = 1e-4);
        assert_relative_eq!(g_hi, num_hi, epsilon = 1e-4);
    }

    /// Decoded intervals are always ordered.
    #[test]
    fn decode_orders_bounds(a in -5.0..5.0_f64, b in -5.0..5.0_f64, t in 0.05..0.99_f64) {
        let outputs = ndarray::array![[a, b]];
        let tube = TubeLoss::symmetric(t).unwrap().decode(&outputs).unwrap();
        let pin = PinballPair::new(t).unwrap().decode(&outputs).unwrap();
        for forecast in [tube, pin] {
            let iv = forecast.get(0).unwrap();
            prop_assert!(iv.lower <= iv.point && iv.point <= iv.upper);
        }
    }
}

// ============================================================================
// Data preparation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Every complete window is produced, each paired with the right target.
    #[test]
    fn window_count_and_alignment(values in series_strategy(10, 80), lookback in 1usize..8, horizon in 1usize..3) {
        let windows = SlidingWindows::new(lookback, horizon).build(&values).unwrap();
        prop_assert_eq!(windows.len(), values.len() - lookback - horizon + 1);
        for (w, &target) in windows.target_index.iter().enumerate() {
            prop_assert_eq!(windows.targets[w], values[target]);
            prop_assert_eq!(windows.inputs[[w, lookback - 1, 0]], values[target - horizon]);
        }
    }

    /// Min-max scaling maps the fitted range onto [0, 1] and inverts exactly.
    #[test]
    fn minmax_roundtrip(values in series_strategy(5, 60)) {
        let scale = ScalingMethod::MinMax.fit(&values);
        for (&raw, &scaled) in values.iter().zip(&scale.data) {
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&scaled));
            assert_relative_eq!(scale.inverse_value(scaled), raw, epsilon = 1e-9);
        }
    }
}
