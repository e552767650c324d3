//! The sole entry point for mu_P/sigma_P computation. Every order-proposal
//! path goes through `build_demand_distribution`; nothing else calls
//! `fit_forecast_model`/`monte_carlo_forecast`/intermittent fitters directly
//! to produce a demand distribution for policy use.

use super::forecast::{self, ForecastModel, HistoryPoint, McParams};
use super::intermittent::{self, IntermittentMethod};
use super::uncertainty::{self, SigmaMethod};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandMethod {
    Simple,
    MonteCarlo,
    Croston,
    Sba,
    Tsb,
    IntermittentAuto,
}

impl DemandMethod {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().trim() {
            "monte_carlo" => DemandMethod::MonteCarlo,
            "croston" => DemandMethod::Croston,
            "sba" => DemandMethod::Sba,
            "tsb" => DemandMethod::Tsb,
            "intermittent_auto" => DemandMethod::IntermittentAuto,
            _ => DemandMethod::Simple,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DemandMethod::Simple => "simple",
            DemandMethod::MonteCarlo => "monte_carlo",
            DemandMethod::Croston => "croston",
            DemandMethod::Sba => "sba",
            DemandMethod::Tsb => "tsb",
            DemandMethod::IntermittentAuto => "intermittent_auto",
        }
    }
}

/// Immutable demand distribution over a protection horizon.
#[derive(Debug, Clone)]
pub struct DemandDistribution {
    pub mu_p: f64,
    pub sigma_p: f64,
    pub protection_period_days: i64,
    pub forecast_method: &'static str,
    pub n_samples: usize,
    pub n_censored: usize,
    pub quantiles: HashMap<&'static str, f64>,
    pub intermittent_submethod: Option<IntermittentMethod>,
    pub is_intermittent: Option<bool>,
    pub adi: Option<f64>,
    pub cv2: Option<f64>,
    pub b_t: Option<f64>,
}

impl DemandDistribution {
    fn zero(protection_period_days: i64, forecast_method: &'static str) -> Self {
        Self {
            mu_p: 0.0,
            sigma_p: 0.0,
            protection_period_days,
            forecast_method,
            n_samples: 0,
            n_censored: 0,
            quantiles: HashMap::new(),
            intermittent_submethod: None,
            is_intermittent: None,
            adi: None,
            cv2: None,
            b_t: None,
        }
    }
}

pub struct BuildParams<'a> {
    pub method: DemandMethod,
    pub history: &'a [HistoryPoint],
    pub protection_period_days: i64,
    pub censored_flags: Option<&'a [bool]>,
    pub alpha_boost_for_censored: f64,
    pub window_weeks: i64,
    pub mc_params: Option<McParams>,
    pub expected_waste_rate: f64,
}

/// Dispatch to the requested method's builder, falling back to `simple` on
/// an unrecognized method tag and to a zero-valued distribution on an empty
/// or non-positive horizon.
pub fn build_demand_distribution(params: BuildParams) -> DemandDistribution {
    if params.protection_period_days <= 0 {
        return DemandDistribution::zero(0, params.method.as_str());
    }
    if params.history.is_empty() {
        return DemandDistribution::zero(params.protection_period_days, params.method.as_str());
    }

    match params.method {
        DemandMethod::MonteCarlo => build_mc(&params),
        DemandMethod::Croston => build_intermittent(&params, IntermittentMethod::Croston),
        DemandMethod::Sba => build_intermittent(&params, IntermittentMethod::Sba),
        DemandMethod::Tsb => build_intermittent(&params, IntermittentMethod::Tsb),
        DemandMethod::IntermittentAuto => build_intermittent_auto(&params),
        DemandMethod::Simple => build_simple(&params),
    }
}

fn series_from_history(history: &[HistoryPoint]) -> Vec<f64> {
    history.iter().map(|h| h.qty_sold).collect()
}

fn simple_forecast_fn(
    censored_flags: Option<&[bool]>,
    alpha_boost: f64,
) -> impl Fn(&[f64]) -> f64 + '_ {
    move |window: &[f64]| {
        let points: Vec<HistoryPoint> = window
            .iter()
            .map(|&qty_sold| HistoryPoint { date: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), qty_sold })
            .collect();
        let model = forecast::fit_forecast_model(&points, 0.3, 14, censored_flags, alpha_boost);
        forecast::predict(&model, 1, None).first().copied().unwrap_or(0.0)
    }
}

fn fit_simple_model(params: &BuildParams) -> ForecastModel {
    forecast::fit_forecast_model(
        params.history,
        0.3,
        14,
        params.censored_flags,
        params.alpha_boost_for_censored,
    )
}

fn build_simple(params: &BuildParams) -> DemandDistribution {
    let model = fit_simple_model(params);
    let forecast_values = forecast::predict(&model, params.protection_period_days, None);
    let mu_p = forecast_values.iter().sum::<f64>().max(0.0);

    let series = series_from_history(params.history);
    let (sigma_day, _n_residuals, _n_excluded) = uncertainty::estimate_demand_uncertainty(
        &series,
        params.censored_flags,
        params.window_weeks,
        SigmaMethod::Mad,
        simple_forecast_fn(params.censored_flags, params.alpha_boost_for_censored),
    );
    let sigma_p = uncertainty::sigma_over_horizon(params.protection_period_days, sigma_day);

    DemandDistribution {
        mu_p,
        sigma_p,
        protection_period_days: params.protection_period_days,
        forecast_method: "simple",
        n_samples: model.n_samples,
        n_censored: model.n_censored,
        quantiles: HashMap::new(),
        intermittent_submethod: None,
        is_intermittent: None,
        adi: None,
        cv2: None,
        b_t: None,
    }
}

fn build_mc(params: &BuildParams) -> DemandDistribution {
    let model = fit_simple_model(params);
    let mc_params = params.mc_params.clone().unwrap_or_default();
    let horizon = params.protection_period_days.max(0) as usize;

    let mc_values = forecast::monte_carlo_forecast(&model, params.history, horizon, &mc_params);
    let mu_p = mc_values.iter().sum::<f64>().max(0.0);

    let series = series_from_history(params.history);
    let (sigma_day, _n_residuals, _n_excluded) = uncertainty::estimate_demand_uncertainty(
        &series,
        params.censored_flags,
        params.window_weeks,
        SigmaMethod::Mad,
        simple_forecast_fn(params.censored_flags, 0.0),
    );
    let sigma_p = uncertainty::sigma_over_horizon(params.protection_period_days, sigma_day);

    let stats = forecast::monte_carlo_forecast_with_stats(&model, params.history, horizon, &mc_params);
    let quantiles: HashMap<&'static str, f64> = stats
        .into_iter()
        .map(|(k, vals)| (k, vals.iter().sum::<f64>()))
        .collect();

    let n_censored = params.censored_flags.map(|f| f.iter().filter(|&&c| c).count()).unwrap_or(0);
    let n_samples = params.history.len() - n_censored;

    DemandDistribution {
        mu_p,
        sigma_p,
        protection_period_days: params.protection_period_days,
        forecast_method: "monte_carlo",
        n_samples,
        n_censored,
        quantiles,
        intermittent_submethod: None,
        is_intermittent: None,
        adi: None,
        cv2: None,
        b_t: None,
    }
}

fn exclude_indices_from_flags(flags: Option<&[bool]>) -> Vec<usize> {
    flags
        .map(|f| f.iter().enumerate().filter(|(_, &c)| c).map(|(i, _)| i).collect())
        .unwrap_or_default()
}

fn build_intermittent(params: &BuildParams, method: IntermittentMethod) -> DemandDistribution {
    let series = series_from_history(params.history);
    let exclude = exclude_indices_from_flags(params.censored_flags);
    let model = match method {
        IntermittentMethod::Croston => intermittent::fit_croston(&series, 0.1, &exclude),
        IntermittentMethod::Sba => intermittent::fit_sba(&series, 0.1, &exclude),
        IntermittentMethod::Tsb => intermittent::fit_tsb(&series, 0.1, 0.1, &exclude),
    };

    let mu_p = intermittent::predict_p_days(&model, params.protection_period_days);
    let sigma_p = intermittent::estimate_sigma_p_rolling(
        &series,
        &model,
        params.protection_period_days,
        &exclude,
    );

    DemandDistribution {
        mu_p: mu_p.max(0.0),
        sigma_p: sigma_p.max(0.0),
        protection_period_days: params.protection_period_days,
        forecast_method: method.as_str(),
        n_samples: model.n_total,
        n_censored: model.n_censored,
        quantiles: HashMap::new(),
        intermittent_submethod: Some(method),
        is_intermittent: None,
        adi: None,
        cv2: None,
        b_t: model.b_t,
    }
}

/// Classify first; if intermittent, prefer TSB when the declining-demand
/// heuristic fires, otherwise pick the better of SBA/TSB by backtest WMAPE
/// over the last 4 periods (falling back to SBA when the backtest is
/// unreliable, i.e. too little history).
fn build_intermittent_auto(params: &BuildParams) -> DemandDistribution {
    let series = series_from_history(params.history);
    let exclude = exclude_indices_from_flags(params.censored_flags);
    let classification = intermittent::classify_intermittent(&series, 1.32, 0.49, &exclude);

    if !classification.is_intermittent {
        let mut dist = build_simple(params);
        dist.is_intermittent = Some(false);
        dist.adi = Some(classification.adi);
        dist.cv2 = Some(classification.cv2);
        return dist;
    }

    let chosen_method = if intermittent::detect_obsolescence(&series, 14, &exclude) {
        IntermittentMethod::Tsb
    } else if series.len() >= 4 + 7 {
        let (best, _results) =
            intermittent::select_best_method(&series, &[IntermittentMethod::Sba, IntermittentMethod::Tsb], 4, 0.1, &exclude);
        best
    } else {
        IntermittentMethod::Sba
    };

    let mut dist = build_intermittent(params, chosen_method);
    dist.forecast_method = "intermittent_auto";
    dist.is_intermittent = Some(true);
    dist.adi = Some(classification.adi);
    dist.cv2 = Some(classification.cv2);
    dist
}
