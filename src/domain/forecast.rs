//! Level + day-of-week forecasting, and Monte Carlo daily-delta simulation.

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal};

#[derive(Debug, Clone)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub qty_sold: f64,
}

/// Fitted level + DOW model state.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    pub level: f64,
    /// Seven factors indexed by weekday, Mon=0..Sun=6.
    pub dow_factors: [f64; 7],
    pub last_date: Option<NaiveDate>,
    pub n_samples: usize,
    pub n_censored: usize,
    pub alpha_eff: f64,
    pub method: &'static str,
}

fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

fn dow_factors_full(dates: &[NaiveDate], quantities: &[f64], level: f64) -> [f64; 7] {
    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); 7];
    for (&d, &qty) in dates.iter().zip(quantities) {
        groups[weekday_index(d)].push(if level > 0.0 { qty / level } else { 1.0 });
    }

    let mut factors = [0.0; 7];
    for (i, group) in groups.iter().enumerate() {
        let factor = if group.is_empty() {
            1.0
        } else {
            group.iter().sum::<f64>() / group.len() as f64
        };
        factors[i] = factor.max(0.1);
    }

    let mean_factor = factors.iter().sum::<f64>() / 7.0;
    if mean_factor > 0.0 {
        for f in factors.iter_mut() {
            *f /= mean_factor;
        }
    }
    factors
}

fn dow_factors_partial(dates: &[NaiveDate], quantities: &[f64], level: f64) -> [f64; 7] {
    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); 7];
    for (&d, &qty) in dates.iter().zip(quantities) {
        groups[weekday_index(d)].push(if level > 0.0 { qty / level } else { 1.0 });
    }

    let mut factors = [1.0; 7];
    for (i, group) in groups.iter().enumerate() {
        if group.len() >= 2 {
            let factor = group.iter().sum::<f64>() / group.len() as f64;
            factors[i] = factor.max(0.1);
        }
    }
    factors
}

/// Fit a level + DOW model. `history` must be oldest-first.
pub fn fit_forecast_model(
    history: &[HistoryPoint],
    alpha: f64,
    min_samples_for_dow: usize,
    censored_flags: Option<&[bool]>,
    alpha_boost_for_censored: f64,
) -> ForecastModel {
    if history.is_empty() {
        return ForecastModel {
            level: 0.0,
            dow_factors: [1.0; 7],
            last_date: None,
            n_samples: 0,
            n_censored: 0,
            alpha_eff: alpha,
            method: "fallback",
        };
    }

    let n_censored = censored_flags.map(|f| f.iter().filter(|&&c| c).count()).unwrap_or(0);

    let filtered: Vec<&HistoryPoint> = match censored_flags {
        Some(flags) => history
            .iter()
            .zip(flags)
            .filter(|(_, &c)| !c)
            .map(|(h, _)| h)
            .collect(),
        None => history.iter().collect(),
    };

    if filtered.is_empty() {
        return ForecastModel {
            level: 0.0,
            dow_factors: [1.0; 7],
            last_date: history.last().map(|h| h.date),
            n_samples: 0,
            n_censored,
            alpha_eff: alpha,
            method: "fallback",
        };
    }

    let alpha_eff = if n_censored > 0 {
        (alpha + alpha_boost_for_censored).min(0.99)
    } else {
        alpha
    };

    let dates: Vec<NaiveDate> = filtered.iter().map(|h| h.date).collect();
    let quantities: Vec<f64> = filtered.iter().map(|h| h.qty_sold.max(0.0)).collect();
    let n_samples = filtered.len();

    let mut level = quantities[0];
    for &qty in &quantities[1..] {
        level = alpha_eff * qty + (1.0 - alpha_eff) * level;
    }
    if level == 0.0 {
        level = 0.1;
    }

    let (dow_factors, method) = if n_samples >= min_samples_for_dow {
        (dow_factors_full(&dates, &quantities, level), "full")
    } else if n_samples >= 7 {
        (dow_factors_partial(&dates, &quantities, level), "simple")
    } else {
        ([1.0; 7], "fallback")
    };

    ForecastModel {
        level,
        dow_factors,
        last_date: dates.last().copied(),
        n_samples,
        n_censored,
        alpha_eff,
        method,
    }
}

/// Daily forecast vector for `horizon` days, starting the day after
/// `model.last_date` (or `start_date` if given).
pub fn predict(model: &ForecastModel, horizon: i64, start_date: Option<NaiveDate>) -> Vec<f64> {
    let start = start_date.or_else(|| model.last_date.map(|d| d + Duration::days(1)));
    let Some(start) = start else {
        return vec![0.0; horizon.max(0) as usize];
    };

    (0..horizon)
        .map(|i| {
            let forecast_date = start + Duration::days(i);
            let dow = weekday_index(forecast_date);
            (model.level * model.dow_factors[dow]).max(0.0)
        })
        .collect()
}

/// Distribution family for Monte Carlo daily-delta sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McDistribution {
    Empirical,
    Normal,
    Lognormal,
    Residuals,
}

impl McDistribution {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "normal" => McDistribution::Normal,
            "lognormal" => McDistribution::Lognormal,
            "residuals" => McDistribution::Residuals,
            _ => McDistribution::Empirical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStat {
    Mean,
    Percentile,
}

/// Monte Carlo simulation configuration.
#[derive(Debug, Clone)]
pub struct McParams {
    pub distribution: McDistribution,
    pub n_simulations: u32,
    pub random_seed: u64,
    pub output_stat: OutputStat,
    pub output_percentile: u8,
    pub expected_waste_rate: f64,
}

impl Default for McParams {
    fn default() -> Self {
        Self {
            distribution: McDistribution::Empirical,
            n_simulations: 1000,
            random_seed: 42,
            output_stat: OutputStat::Mean,
            output_percentile: 80,
            expected_waste_rate: 0.0,
        }
    }
}

fn sample_daily_draws(
    model: &ForecastModel,
    history: &[HistoryPoint],
    horizon: usize,
    params: &McParams,
) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.random_seed);
    let baseline = predict(model, horizon as i64, None);

    let empirical_deltas: Vec<f64> = history
        .iter()
        .map(|h| h.qty_sold - model.level)
        .collect();

    let sigma_for_normal = {
        let n = empirical_deltas.len();
        if n < 2 {
            model.level.max(1.0) * 0.2
        } else {
            let mean = empirical_deltas.iter().sum::<f64>() / n as f64;
            (empirical_deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
        }
    };

    (0..params.n_simulations)
        .map(|_| {
            baseline
                .iter()
                .map(|&base| {
                    let value = match params.distribution {
                        McDistribution::Empirical | McDistribution::Residuals => {
                            if empirical_deltas.is_empty() {
                                base
                            } else {
                                let idx = rng.gen_range(0..empirical_deltas.len());
                                (base + empirical_deltas[idx]).max(0.0)
                            }
                        }
                        McDistribution::Normal => {
                            let dist = Normal::new(0.0, sigma_for_normal.max(1e-6)).unwrap();
                            (base + dist.sample(&mut rng)).max(0.0)
                        }
                        McDistribution::Lognormal => {
                            let mu = (base.max(0.1)).ln();
                            let sigma = 0.25_f64;
                            let dist = LogNormal::new(mu, sigma).unwrap();
                            dist.sample(&mut rng)
                        }
                    };
                    value * (1.0 - params.expected_waste_rate)
                })
                .collect()
        })
        .collect()
}

/// Per-day forecast vector (length `horizon`) aggregated across simulations
/// by `output_stat`. Deterministic given an identical seed.
pub fn monte_carlo_forecast(
    model: &ForecastModel,
    history: &[HistoryPoint],
    horizon_days: usize,
    params: &McParams,
) -> Vec<f64> {
    if horizon_days == 0 {
        return Vec::new();
    }
    let simulations = sample_daily_draws(model, history, horizon_days, params);

    (0..horizon_days)
        .map(|day| {
            let mut day_values: Vec<f64> = simulations.iter().map(|sim| sim[day]).collect();
            match params.output_stat {
                OutputStat::Mean => day_values.iter().sum::<f64>() / day_values.len() as f64,
                OutputStat::Percentile => {
                    day_values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                    let idx = ((params.output_percentile as f64 / 100.0)
                        * (day_values.len() as f64 - 1.0))
                        .round() as usize;
                    day_values[idx.min(day_values.len() - 1)]
                }
            }
        })
        .collect()
}

/// Per-day percentile vectors {p50, p80, p90, p95}, each length `horizon_days`.
pub fn monte_carlo_forecast_with_stats(
    model: &ForecastModel,
    history: &[HistoryPoint],
    horizon_days: usize,
    params: &McParams,
) -> std::collections::HashMap<&'static str, Vec<f64>> {
    let mut map = std::collections::HashMap::new();
    if horizon_days == 0 {
        return map;
    }
    let simulations = sample_daily_draws(model, history, horizon_days, params);

    let percentile_of = |day: usize, pct: f64| -> f64 {
        let mut day_values: Vec<f64> = simulations.iter().map(|sim| sim[day]).collect();
        day_values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = (pct * (day_values.len() as f64 - 1.0)).round() as usize;
        day_values[idx.min(day_values.len() - 1)]
    };

    for (key, pct) in [("p50", 0.50), ("p80", 0.80), ("p90", 0.90), ("p95", 0.95)] {
        map.insert(key, (0..horizon_days).map(|d| percentile_of(d, pct)).collect());
    }
    map
}
