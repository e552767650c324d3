//! Black-box tests for robust sigma estimation and safety-stock sizing.

use replenish_engine::domain::uncertainty::{
    calculate_forecast_residuals, estimate_demand_uncertainty, robust_sigma, safety_stock_for_csl,
    sigma_over_horizon, winsorized_sigma, z_score_for_csl, SigmaMethod,
};

#[test]
fn robust_sigma_is_unaffected_by_a_single_outlier() {
    let clean = robust_sigma(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let with_outlier = robust_sigma(&[1.0, 2.0, 3.0, 4.0, 1000.0]);
    assert!((clean - with_outlier).abs() < 1e-9);
}

#[test]
fn robust_sigma_is_zero_below_two_residuals() {
    assert_eq!(robust_sigma(&[1.0]), 0.0);
    assert_eq!(robust_sigma(&[]), 0.0);
}

#[test]
fn winsorized_sigma_requires_at_least_three_residuals() {
    assert_eq!(winsorized_sigma(&[1.0, 2.0], 0.05), 0.0);
}

#[test]
fn winsorized_sigma_dampens_but_does_not_ignore_outliers() {
    let clean = winsorized_sigma(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.1);
    let with_outlier = winsorized_sigma(&[1.0, 2.0, 3.0, 4.0, 1000.0], 0.1);
    assert!(with_outlier >= clean);
}

#[test]
fn sigma_over_horizon_scales_with_the_square_root_of_the_protection_period() {
    assert_eq!(sigma_over_horizon(1, 10.0), 10.0);
    assert!((sigma_over_horizon(4, 10.0) - 20.0).abs() < 1e-9);
    assert!((sigma_over_horizon(9, 10.0) - 30.0).abs() < 1e-9);
}

#[test]
fn sigma_over_horizon_is_zero_for_non_positive_inputs() {
    assert_eq!(sigma_over_horizon(0, 10.0), 0.0);
    assert_eq!(sigma_over_horizon(10, 0.0), 0.0);
    assert_eq!(sigma_over_horizon(10, -1.0), 0.0);
}

#[test]
fn forecast_residuals_are_empty_below_the_minimum_window_requirement() {
    let series: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
    let (residuals, n_excluded) = calculate_forecast_residuals(&series, None, 8, |_w| 10.0);
    assert!(residuals.is_empty());
    assert_eq!(n_excluded, 0);
}

#[test]
fn forecast_residuals_exclude_censored_observations_from_the_residual_set() {
    let series: Vec<f64> = (0..70).map(|i| 10.0 + (i % 5) as f64).collect();
    let mut flags = vec![false; 70];
    flags[60] = true;
    flags[65] = true;

    let (residuals, n_excluded) = calculate_forecast_residuals(&series, Some(&flags), 8, |w| {
        w.iter().sum::<f64>() / w.len() as f64
    });
    assert_eq!(n_excluded, 2);
    assert!(!residuals.is_empty());
}

#[test]
fn estimate_demand_uncertainty_returns_zero_sigma_when_residuals_cannot_be_computed() {
    let series: Vec<f64> = (0..5).map(|i| i as f64).collect();
    let (sigma, n_residuals, n_excluded) =
        estimate_demand_uncertainty(&series, None, 8, SigmaMethod::Mad, |_w| 0.0);
    assert_eq!(sigma, 0.0);
    assert_eq!(n_residuals, 0);
    assert_eq!(n_excluded, 0);
}

#[test]
fn estimate_demand_uncertainty_mad_and_winsorized_both_produce_non_negative_sigma() {
    let series: Vec<f64> = (0..70).map(|i| 10.0 + (i % 4) as f64).collect();
    let forecast_one_day = |w: &[f64]| w.iter().sum::<f64>() / w.len() as f64;

    let (sigma_mad, _n, _c) = estimate_demand_uncertainty(&series, None, 8, SigmaMethod::Mad, forecast_one_day);
    let (sigma_wins, _n2, _c2) =
        estimate_demand_uncertainty(&series, None, 8, SigmaMethod::Winsorized, forecast_one_day);
    assert!(sigma_mad >= 0.0);
    assert!(sigma_wins >= 0.0);
}

#[test]
fn z_score_table_has_exact_matches_and_snaps_to_the_nearest_entry() {
    assert!((z_score_for_csl(0.95) - 1.645).abs() < 1e-9);
    assert!((z_score_for_csl(0.99) - 2.326).abs() < 1e-9);
    assert!((z_score_for_csl(0.96) - 1.645).abs() < 1e-9);
}

#[test]
fn safety_stock_is_zero_for_a_non_positive_horizon_sigma() {
    assert_eq!(safety_stock_for_csl(0.0, 0.95), 0.0);
    assert_eq!(safety_stock_for_csl(-5.0, 0.95), 0.0);
}

#[test]
fn safety_stock_matches_the_known_worked_example() {
    let ss = safety_stock_for_csl(20.0, 0.95);
    assert!((ss - 32.9).abs() < 0.01);
}
