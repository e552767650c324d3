//! Croston / SBA / TSB intermittent-demand methods, ADI/CV² classification,
//! and backtest-based method selection.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermittentMethod {
    Croston,
    Sba,
    Tsb,
}

impl IntermittentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntermittentMethod::Croston => "croston",
            IntermittentMethod::Sba => "sba",
            IntermittentMethod::Tsb => "tsb",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntermittentModel {
    pub method: IntermittentMethod,
    pub alpha: f64,
    pub p_t: f64,
    pub z_t: f64,
    pub b_t: Option<f64>,
    pub n_nonzero: usize,
    pub n_total: usize,
    pub n_censored: usize,
}

fn clean_series(series: &[f64], exclude_indices: &[usize]) -> Vec<f64> {
    series
        .iter()
        .enumerate()
        .filter(|(i, _)| !exclude_indices.contains(i))
        .map(|(_, &v)| v)
        .collect()
}

/// Fit Croston's method. `alpha` must be in (0, 1].
pub fn fit_croston(series: &[f64], alpha: f64, exclude_indices: &[usize]) -> IntermittentModel {
    let clean = clean_series(series, exclude_indices);
    let nonzero_indices: Vec<usize> = clean.iter().enumerate().filter(|(_, &v)| v > 0.0).map(|(i, _)| i).collect();
    let n_nonzero = nonzero_indices.len();

    if n_nonzero == 0 {
        return IntermittentModel {
            method: IntermittentMethod::Croston,
            alpha,
            p_t: clean.len() as f64,
            z_t: 0.0,
            b_t: None,
            n_nonzero: 0,
            n_total: clean.len(),
            n_censored: exclude_indices.len(),
        };
    }

    let first_idx = nonzero_indices[0];
    let mut p_t = (first_idx + 1) as f64;
    let mut z_t = clean[first_idx];
    let mut last_nonzero_idx = first_idx;

    for &idx in &nonzero_indices[1..] {
        let interval = (idx - last_nonzero_idx) as f64;
        let demand_size = clean[idx];
        p_t = alpha * interval + (1.0 - alpha) * p_t;
        z_t = alpha * demand_size + (1.0 - alpha) * z_t;
        last_nonzero_idx = idx;
    }

    IntermittentModel {
        method: IntermittentMethod::Croston,
        alpha,
        p_t: p_t.max(0.1),
        z_t,
        b_t: None,
        n_nonzero,
        n_total: clean.len(),
        n_censored: exclude_indices.len(),
    }
}

/// Fit SBA (same fit as Croston; bias correction applies at predict time).
pub fn fit_sba(series: &[f64], alpha: f64, exclude_indices: &[usize]) -> IntermittentModel {
    let mut model = fit_croston(series, alpha, exclude_indices);
    model.method = IntermittentMethod::Sba;
    model
}

/// Fit TSB (separately smoothed occurrence probability and demand size).
pub fn fit_tsb(
    series: &[f64],
    alpha_demand: f64,
    alpha_probability: f64,
    exclude_indices: &[usize],
) -> IntermittentModel {
    let clean = clean_series(series, exclude_indices);
    let n_nonzero = clean.iter().filter(|&&v| v > 0.0).count();

    if n_nonzero == 0 {
        return IntermittentModel {
            method: IntermittentMethod::Tsb,
            alpha: alpha_demand,
            p_t: 0.0,
            z_t: 0.0,
            b_t: Some(0.0),
            n_nonzero: 0,
            n_total: clean.len(),
            n_censored: exclude_indices.len(),
        };
    }

    let first_nonzero_idx = clean.iter().position(|&v| v > 0.0).unwrap();
    let mut z_t = clean[first_nonzero_idx];
    let mut b_t = if clean[0] > 0.0 { 1.0 } else { 0.0 };

    for &demand in &clean[1..] {
        let occurrence = if demand > 0.0 { 1.0 } else { 0.0 };
        b_t = alpha_probability * occurrence + (1.0 - alpha_probability) * b_t;
        if demand > 0.0 {
            z_t = alpha_demand * demand + (1.0 - alpha_demand) * z_t;
        }
    }

    IntermittentModel {
        method: IntermittentMethod::Tsb,
        alpha: alpha_demand,
        p_t: 0.0,
        z_t,
        b_t: Some(b_t.max(0.0001)),
        n_nonzero,
        n_total: clean.len(),
        n_censored: exclude_indices.len(),
    }
}

/// Predicted daily demand for a fitted model (may be fractional).
pub fn predict_daily(model: &IntermittentModel) -> f64 {
    match model.method {
        IntermittentMethod::Croston => {
            if model.p_t <= 0.0 { 0.0 } else { model.z_t / model.p_t }
        }
        IntermittentMethod::Sba => {
            if model.p_t <= 0.0 {
                0.0
            } else {
                (1.0 - model.alpha / 2.0) * model.z_t / model.p_t
            }
        }
        IntermittentMethod::Tsb => model.b_t.unwrap_or(0.0) * model.z_t,
    }
}

/// `predict_daily(model) × P`.
pub fn predict_p_days(model: &IntermittentModel, p: i64) -> f64 {
    predict_daily(model) * p as f64
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub is_intermittent: bool,
    pub adi: f64,
    pub cv2: f64,
    pub n_nonzero: usize,
    pub n_total: usize,
    pub n_censored: usize,
}

/// ADI > threshold AND CV² > threshold classifies as intermittent.
pub fn classify_intermittent(
    series: &[f64],
    adi_threshold: f64,
    cv2_threshold: f64,
    exclude_indices: &[usize],
) -> Classification {
    let clean = clean_series(series, exclude_indices);
    if clean.is_empty() {
        return Classification {
            is_intermittent: false,
            adi: 0.0,
            cv2: 0.0,
            n_nonzero: 0,
            n_total: 0,
            n_censored: exclude_indices.len(),
        };
    }

    let nonzero: Vec<f64> = clean.iter().copied().filter(|&v| v > 0.0).collect();
    let n_nonzero = nonzero.len();
    let n_total = clean.len();

    if n_nonzero == 0 {
        return Classification {
            is_intermittent: true,
            adi: n_total as f64,
            cv2: 0.0,
            n_nonzero: 0,
            n_total,
            n_censored: exclude_indices.len(),
        };
    }

    let adi = n_total as f64 / n_nonzero as f64;

    let cv2 = if n_nonzero < 2 {
        0.0
    } else {
        let mean_nonzero = nonzero.iter().sum::<f64>() / n_nonzero as f64;
        if mean_nonzero == 0.0 {
            0.0
        } else {
            let variance = nonzero.iter().map(|v| (v - mean_nonzero).powi(2)).sum::<f64>()
                / (n_nonzero as f64 - 1.0);
            let cv = variance.sqrt() / mean_nonzero;
            cv * cv
        }
    };

    Classification {
        is_intermittent: adi > adi_threshold && cv2 > cv2_threshold,
        adi,
        cv2,
        n_nonzero,
        n_total,
        n_censored: exclude_indices.len(),
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub method: IntermittentMethod,
    pub wmape: f64,
    pub bias: f64,
    pub n_forecasts: usize,
    pub n_observations: usize,
}

fn fit_by_method(train: &[f64], method: IntermittentMethod, alpha: f64, exclude: &[usize]) -> IntermittentModel {
    match method {
        IntermittentMethod::Croston => fit_croston(train, alpha, exclude),
        IntermittentMethod::Sba => fit_sba(train, alpha, exclude),
        IntermittentMethod::Tsb => fit_tsb(train, alpha, alpha, exclude),
    }
}

/// Rolling-origin backtest over the last `test_periods` observations.
pub fn backtest_method(
    series: &[f64],
    method: IntermittentMethod,
    test_periods: usize,
    alpha: f64,
    exclude_indices: &[usize],
) -> BacktestResult {
    if series.len() < test_periods + 7 {
        return BacktestResult { method, wmape: 999.0, bias: 0.0, n_forecasts: 0, n_observations: 0 };
    }

    let mut errors = Vec::new();
    let mut actuals = Vec::new();

    for test_idx in (series.len() - test_periods)..series.len() {
        if exclude_indices.contains(&test_idx) {
            continue;
        }
        let train_series = &series[..test_idx];
        let train_exclude: Vec<usize> = exclude_indices.iter().copied().filter(|&i| i < test_idx).collect();

        if train_series.is_empty() {
            continue;
        }
        let model = fit_by_method(train_series, method, alpha, &train_exclude);
        let forecast = predict_daily(&model);
        let actual = series[test_idx];

        actuals.push(actual);
        errors.push(forecast - actual);
    }

    if actuals.is_empty() {
        return BacktestResult { method, wmape: 999.0, bias: 0.0, n_forecasts: 0, n_observations: 0 };
    }

    let total_actual: f64 = actuals.iter().sum();
    let wmape = if total_actual == 0.0 {
        999.0
    } else {
        errors.iter().map(|e| e.abs()).sum::<f64>() / total_actual
    };
    let bias = errors.iter().sum::<f64>() / errors.len() as f64;

    BacktestResult { method, wmape, bias, n_forecasts: errors.len(), n_observations: actuals.len() }
}

/// Best of `candidates` by minimum WMAPE over the backtest window.
pub fn select_best_method(
    series: &[f64],
    candidates: &[IntermittentMethod],
    test_periods: usize,
    alpha: f64,
    exclude_indices: &[usize],
) -> (IntermittentMethod, Vec<BacktestResult>) {
    let results: Vec<BacktestResult> = candidates
        .iter()
        .map(|&m| backtest_method(series, m, test_periods, alpha, exclude_indices))
        .collect();

    let best = results
        .iter()
        .min_by(|a, b| a.wmape.partial_cmp(&b.wmape).unwrap())
        .map(|r| r.method)
        .unwrap_or(IntermittentMethod::Sba);

    (best, results)
}

/// Rolling-residual sigma_P for the fitted model, aggregated over P-day
/// windows; falls back to `z_t × √P` when history is too short.
pub fn estimate_sigma_p_rolling(
    series: &[f64],
    model: &IntermittentModel,
    p: i64,
    exclude_indices: &[usize],
) -> f64 {
    let p_usize = p.max(0) as usize;
    let fallback = if model.z_t > 0.0 { model.z_t * (p as f64).sqrt() } else { 1.0 };

    if series.len() < p_usize + 7 {
        return fallback;
    }

    let mut errors = Vec::new();
    for t in 7..series.len() {
        if exclude_indices.contains(&t) {
            continue;
        }
        let train_series = &series[..t];
        let train_exclude: Vec<usize> = exclude_indices.iter().copied().filter(|&i| i < t).collect();
        let m = fit_by_method(train_series, model.method, model.alpha, &train_exclude);
        let forecast = predict_daily(&m);
        errors.push(forecast - series[t]);
    }

    if errors.len() < p_usize {
        return fallback;
    }

    let aggregated: Vec<f64> = (0..=errors.len() - p_usize)
        .map(|i| errors[i..i + p_usize].iter().sum::<f64>())
        .collect();

    if aggregated.is_empty() {
        return fallback;
    }

    let mean = aggregated.iter().sum::<f64>() / aggregated.len() as f64;
    let variance = aggregated.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / aggregated.len() as f64;
    variance.sqrt().max(0.1)
}

/// Declining-demand heuristic: recent window mean < 70% of older window mean.
pub fn detect_obsolescence(series: &[f64], window: usize, exclude_indices: &[usize]) -> bool {
    let clean = clean_series(series, exclude_indices);
    if clean.len() < 2 * window {
        return false;
    }

    let old_avg: f64 = clean[clean.len() - 2 * window..clean.len() - window].iter().sum::<f64>() / window as f64;
    let recent_avg: f64 = clean[clean.len() - window..].iter().sum::<f64>() / window as f64;

    if old_avg == 0.0 {
        return false;
    }
    recent_avg < 0.7 * old_avg
}
