//! Black-box tests for level+DOW forecasting and Monte Carlo simulation.

use chrono::{Duration, NaiveDate};
use replenish_engine::domain::forecast::{
    fit_forecast_model, monte_carlo_forecast, monte_carlo_forecast_with_stats, predict, HistoryPoint, McDistribution,
    McParams, OutputStat,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn hist(start: NaiveDate, values: &[f64]) -> Vec<HistoryPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &qty_sold)| HistoryPoint { date: start + Duration::days(i as i64), qty_sold })
        .collect()
}

#[test]
fn empty_history_falls_back_to_a_zero_level_model() {
    let model = fit_forecast_model(&[], 0.3, 14, None, 0.0);
    assert_eq!(model.method, "fallback");
    assert_eq!(model.level, 0.0);
    assert_eq!(model.n_samples, 0);
}

#[test]
fn fully_censored_history_also_falls_back() {
    let history = hist(d(2026, 1, 1), &[10.0, 10.0, 10.0]);
    let flags = vec![true, true, true];
    let model = fit_forecast_model(&history, 0.3, 14, Some(&flags), 0.1);
    assert_eq!(model.n_samples, 0);
    assert_eq!(model.n_censored, 3);
}

#[test]
fn censored_days_boost_the_effective_alpha() {
    let history = hist(d(2026, 1, 1), &[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0]);
    let mut flags = vec![false; 8];
    flags[0] = true;
    let boosted = fit_forecast_model(&history, 0.3, 14, Some(&flags), 0.2);
    let unboosted = fit_forecast_model(&history, 0.3, 14, None, 0.2);
    assert!(boosted.alpha_eff > unboosted.alpha_eff);
}

#[test]
fn a_full_history_window_fits_a_dow_model_per_weekday() {
    let values: Vec<f64> = (0..28).map(|i| 10.0 + (i % 7) as f64).collect();
    let history = hist(d(2026, 1, 5), &values); // Monday
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);
    assert_eq!(model.method, "full");
    assert!(model.dow_factors.iter().all(|&f| f > 0.0));
}

#[test]
fn predict_starts_the_day_after_the_models_last_observation() {
    let history = hist(d(2026, 1, 1), &[10.0, 12.0, 8.0]);
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);
    let forecast = predict(&model, 5, None);
    assert_eq!(forecast.len(), 5);
    assert!(forecast.iter().all(|&v| v >= 0.0));
}

#[test]
fn predict_with_no_anchor_date_and_zero_horizon_returns_an_empty_vector() {
    let model = fit_forecast_model(&[], 0.3, 14, None, 0.0);
    let forecast = predict(&model, 0, None);
    assert!(forecast.is_empty());
}

#[test]
fn monte_carlo_forecast_is_deterministic_given_the_same_seed() {
    let values: Vec<f64> = (0..20).map(|i| 10.0 + (i % 3) as f64).collect();
    let history = hist(d(2026, 1, 1), &values);
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);
    let params = McParams::default();

    let a = monte_carlo_forecast(&model, &history, 7, &params);
    let b = monte_carlo_forecast(&model, &history, 7, &params);
    assert_eq!(a, b);
    assert_eq!(a.len(), 7);
}

#[test]
fn monte_carlo_forecast_with_zero_horizon_returns_empty() {
    let history = hist(d(2026, 1, 1), &[10.0, 12.0]);
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);
    let params = McParams::default();
    assert!(monte_carlo_forecast(&model, &history, 0, &params).is_empty());
}

#[test]
fn monte_carlo_percentile_output_is_at_least_the_mean_for_a_noisy_series() {
    let values: Vec<f64> = (0..30).map(|i| if i % 5 == 0 { 40.0 } else { 5.0 }).collect();
    let history = hist(d(2026, 1, 1), &values);
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);

    let mean_params = McParams { output_stat: OutputStat::Mean, random_seed: 7, ..McParams::default() };
    let p90_params = McParams { output_stat: OutputStat::Percentile, output_percentile: 90, random_seed: 7, ..McParams::default() };

    let mean_forecast = monte_carlo_forecast(&model, &history, 5, &mean_params);
    let p90_forecast = monte_carlo_forecast(&model, &history, 5, &p90_params);
    for (mean_val, p90_val) in mean_forecast.iter().zip(p90_forecast.iter()) {
        assert!(p90_val >= mean_val);
    }
}

#[test]
fn monte_carlo_forecast_with_stats_returns_ordered_percentile_vectors() {
    let values: Vec<f64> = (0..30).map(|i| 10.0 + (i % 6) as f64).collect();
    let history = hist(d(2026, 1, 1), &values);
    let model = fit_forecast_model(&history, 0.3, 14, None, 0.0);
    let params = McParams::default();

    let stats = monte_carlo_forecast_with_stats(&model, &history, 4, &params);
    for key in ["p50", "p80", "p90", "p95"] {
        assert!(stats.contains_key(key));
        assert_eq!(stats[key].len(), 4);
    }
    for day in 0..4 {
        assert!(stats["p50"][day] <= stats["p80"][day]);
        assert!(stats["p80"][day] <= stats["p90"][day]);
        assert!(stats["p90"][day] <= stats["p95"][day]);
    }
}

#[test]
fn mc_distribution_parse_falls_back_to_empirical_on_unknown_tags() {
    assert_eq!(McDistribution::parse("normal"), McDistribution::Normal);
    assert_eq!(McDistribution::parse("LOGNORMAL"), McDistribution::Lognormal);
    assert_eq!(McDistribution::parse("residuals"), McDistribution::Residuals);
    assert_eq!(McDistribution::parse("anything_else"), McDistribution::Empirical);
}
