//! Black-box tests for Croston/SBA/TSB fitting, classification, and
//! method selection — complementing the module's own inline tests.

use replenish_engine::domain::intermittent::{
    backtest_method, classify_intermittent, detect_obsolescence, estimate_sigma_p_rolling, fit_croston, fit_sba,
    fit_tsb, predict_daily, predict_p_days, select_best_method, IntermittentMethod,
};

fn lumpy_series() -> Vec<f64> {
    vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 8.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 6.0]
}

#[test]
fn croston_with_no_nonzero_demand_predicts_zero() {
    let model = fit_croston(&[0.0, 0.0, 0.0, 0.0], 0.1, &[]);
    assert_eq!(model.n_nonzero, 0);
    assert_eq!(predict_daily(&model), 0.0);
}

#[test]
fn predict_p_days_scales_linearly_with_the_protection_period() {
    let model = fit_croston(&lumpy_series(), 0.1, &[]);
    let daily = predict_daily(&model);
    assert!((predict_p_days(&model, 7) - daily * 7.0).abs() < 1e-9);
}

#[test]
fn tsb_with_no_nonzero_demand_predicts_zero_via_zero_probability() {
    let model = fit_tsb(&[0.0, 0.0, 0.0], 0.1, 0.1, &[]);
    assert_eq!(model.b_t, Some(0.0));
    assert_eq!(predict_daily(&model), 0.0);
}

#[test]
fn tsb_probability_rises_after_a_run_of_nonzero_days() {
    let sparse = vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 3.0];
    let dense = vec![4.0, 5.0, 5.0, 4.0, 6.0, 5.0, 4.0];
    let sparse_model = fit_tsb(&sparse, 0.2, 0.2, &[]);
    let dense_model = fit_tsb(&dense, 0.2, 0.2, &[]);
    assert!(dense_model.b_t.unwrap() > sparse_model.b_t.unwrap());
}

#[test]
fn excluded_indices_are_removed_before_fitting() {
    let series = vec![0.0, 0.0, 100.0, 0.0, 0.0, 3.0, 0.0];
    let without_exclusion = fit_croston(&series, 0.1, &[]);
    let with_exclusion = fit_croston(&series, 0.1, &[2]);
    assert!(with_exclusion.n_total < without_exclusion.n_total);
}

#[test]
fn classification_reports_an_empty_series_as_not_intermittent() {
    let classification = classify_intermittent(&[], 1.32, 0.49, &[]);
    assert!(!classification.is_intermittent);
    assert_eq!(classification.n_total, 0);
}

#[test]
fn classification_treats_an_all_zero_series_as_intermittent() {
    let classification = classify_intermittent(&[0.0, 0.0, 0.0, 0.0], 1.32, 0.49, &[]);
    assert!(classification.is_intermittent);
    assert_eq!(classification.n_nonzero, 0);
}

#[test]
fn backtest_falls_back_to_a_sentinel_score_when_history_is_too_short() {
    let series = vec![1.0, 2.0, 3.0];
    let result = backtest_method(&series, IntermittentMethod::Sba, 4, 0.1, &[]);
    assert_eq!(result.wmape, 999.0);
    assert_eq!(result.n_forecasts, 0);
}

#[test]
fn select_best_method_picks_the_lowest_wmape_candidate() {
    let series = lumpy_series();
    let (best, results) =
        select_best_method(&series, &[IntermittentMethod::Sba, IntermittentMethod::Tsb], 4, 0.1, &[]);
    assert!(results.iter().any(|r| r.method == best));
    let best_wmape = results.iter().map(|r| r.wmape).fold(f64::INFINITY, f64::min);
    let chosen_wmape = results.iter().find(|r| r.method == best).unwrap().wmape;
    assert_eq!(chosen_wmape, best_wmape);
}

#[test]
fn sigma_p_rolling_falls_back_when_history_is_shorter_than_the_protection_window() {
    let series = vec![1.0, 2.0, 3.0];
    let model = fit_croston(&series, 0.1, &[]);
    let sigma = estimate_sigma_p_rolling(&series, &model, 7, &[]);
    assert!(sigma >= 0.0);
}

#[test]
fn obsolescence_is_not_flagged_for_a_flat_series() {
    let series = vec![10.0; 28];
    assert!(!detect_obsolescence(&series, 14, &[]));
}

#[test]
fn obsolescence_requires_at_least_two_full_windows_of_history() {
    let series = vec![10.0; 20];
    assert!(!detect_obsolescence(&series, 14, &[]));
}
