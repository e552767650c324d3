//! Robust statistical estimators for demand uncertainty.

const MAD_TO_SIGMA_FACTOR: f64 = 1.4826;

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    variance.sqrt()
}

/// `1.4826 × median(|r - median(r)|)`. Returns 0.0 for fewer than 2 residuals.
pub fn robust_sigma(residuals: &[f64]) -> f64 {
    if residuals.len() < 2 {
        return 0.0;
    }
    let median_residual = median(residuals);
    let absolute_deviations: Vec<f64> = residuals.iter().map(|r| (r - median_residual).abs()).collect();
    MAD_TO_SIGMA_FACTOR * median(&absolute_deviations)
}

/// Winsorized standard deviation at `trim_proportion` from each tail.
/// Returns 0.0 for fewer than 3 residuals.
pub fn winsorized_sigma(residuals: &[f64], trim_proportion: f64) -> f64 {
    let n = residuals.len();
    if n < 3 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = residuals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let trim_count = ((n as f64 * trim_proportion) as usize).max(1);
    let lower_bound = sorted[trim_count - 1];
    let upper_bound = sorted[n - trim_count];

    let winsorized: Vec<f64> = residuals
        .iter()
        .map(|&r| if r < lower_bound { lower_bound } else if r > upper_bound { upper_bound } else { r })
        .collect();

    if winsorized.windows(2).all(|w| w[0] == w[1]) {
        return 0.0;
    }
    stdev(&winsorized)
}

/// `σ_day × √P`. Returns 0.0 when either input is non-positive.
pub fn sigma_over_horizon(protection_period_days: i64, sigma_daily: f64) -> f64 {
    if protection_period_days <= 0 || sigma_daily <= 0.0 {
        return 0.0;
    }
    sigma_daily * (protection_period_days as f64).sqrt()
}

/// One observation in a forecast history series.
#[derive(Debug, Clone, Copy)]
pub struct HistoryPoint {
    pub qty_sold: f64,
}

/// Rolling one-step-ahead residuals, excluding censored days from the
/// residual set (not from the training window). `forecast_one_day` fits on
/// the preceding `window_days` points and returns a single-day forecast.
pub fn calculate_forecast_residuals(
    series: &[f64],
    censored_flags: Option<&[bool]>,
    window_weeks: i64,
    forecast_one_day: impl Fn(&[f64]) -> f64,
) -> (Vec<f64>, usize) {
    let window_days = (window_weeks * 7) as usize;
    let min_required_days = window_days + 7;
    if series.len() < min_required_days {
        return (Vec::new(), 0);
    }

    let flags: Vec<bool> = match censored_flags {
        Some(f) => f.to_vec(),
        None => vec![false; series.len()],
    };

    let mut residuals = Vec::new();
    let mut n_censored_excluded = 0;

    for i in window_days..series.len() {
        if flags[i] {
            n_censored_excluded += 1;
            continue;
        }
        let train_window = &series[i - window_days..i];
        let predicted = forecast_one_day(train_window);
        residuals.push(series[i] - predicted);
    }

    (residuals, n_censored_excluded)
}

pub enum SigmaMethod {
    Mad,
    Winsorized,
}

/// `(sigma_day, n_residuals, n_censored_excluded)`.
pub fn estimate_demand_uncertainty(
    series: &[f64],
    censored_flags: Option<&[bool]>,
    window_weeks: i64,
    method: SigmaMethod,
    forecast_one_day: impl Fn(&[f64]) -> f64,
) -> (f64, usize, usize) {
    let (residuals, n_censored_excluded) =
        calculate_forecast_residuals(series, censored_flags, window_weeks, forecast_one_day);

    if residuals.is_empty() {
        return (0.0, 0, n_censored_excluded);
    }

    let sigma_day = match method {
        SigmaMethod::Mad => robust_sigma(&residuals),
        SigmaMethod::Winsorized => winsorized_sigma(&residuals, 0.05),
    };

    (sigma_day, residuals.len(), n_censored_excluded)
}

/// Z-score lookup, nearest-key match for targets not listed exactly.
pub fn z_score_for_csl(target_csl: f64) -> f64 {
    const TABLE: &[(f64, f64)] = &[
        (0.50, 0.000),
        (0.75, 0.674),
        (0.80, 0.842),
        (0.85, 1.036),
        (0.90, 1.282),
        (0.95, 1.645),
        (0.98, 2.054),
        (0.99, 2.326),
        (0.995, 2.576),
        (0.999, 3.090),
    ];

    TABLE
        .iter()
        .min_by(|a, b| (a.0 - target_csl).abs().partial_cmp(&(b.0 - target_csl).abs()).unwrap())
        .map(|(_, z)| *z)
        .unwrap_or(1.645)
}

/// `z(csl) × σ_P`. Returns 0.0 when `sigma_horizon <= 0`.
pub fn safety_stock_for_csl(sigma_horizon: f64, target_csl: f64) -> f64 {
    if sigma_horizon <= 0.0 {
        return 0.0;
    }
    z_score_for_csl(target_csl) * sigma_horizon
}
