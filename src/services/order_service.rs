use crate::config::Config;
use crate::db::Storage;
use crate::domain::calendar::{CalendarConfig, Lane};
use crate::domain::demand_builder::{build_demand_distribution, BuildParams, DemandMethod};
use crate::domain::fefo::{self, PenaltyMode};
use crate::domain::forecast::{HistoryPoint, McDistribution, McParams, OutputStat};
use crate::domain::ledger::{is_day_censored, StockCalculator};
use crate::domain::models::{AuditLogEntry, EventKind, OrderLog, OrderStatus, Sku, Transaction};
use crate::domain::uncertainty::safety_stock_for_csl;
use crate::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn penalty_mode_of(mode: crate::domain::models::WastePenaltyMode) -> PenaltyMode {
    match mode {
        crate::domain::models::WastePenaltyMode::None => PenaltyMode::None,
        crate::domain::models::WastePenaltyMode::Soft => PenaltyMode::Soft,
        crate::domain::models::WastePenaltyMode::Hard => PenaltyMode::Hard,
    }
}

fn demand_method_of(method: crate::domain::models::ForecastMethod) -> DemandMethod {
    use crate::domain::models::ForecastMethod as FM;
    match method {
        FM::Simple => DemandMethod::Simple,
        FM::MonteCarlo => DemandMethod::MonteCarlo,
        FM::Croston => DemandMethod::Croston,
        FM::Sba => DemandMethod::Sba,
        FM::Tsb => DemandMethod::Tsb,
        FM::IntermittentAuto => DemandMethod::IntermittentAuto,
    }
}

fn output_stat_of(s: &str) -> OutputStat {
    match s.to_lowercase().as_str() {
        "percentile" => OutputStat::Percentile,
        _ => OutputStat::Mean,
    }
}

/// Round `qty` up to the nearest positive multiple of `step`.
fn round_up_to_multiple(qty: i64, step: i64) -> i64 {
    if step <= 1 || qty <= 0 {
        return qty.max(0);
    }
    ((qty + step - 1) / step) * step
}

/// Proposed reorder quantity and the stock/waste-risk context it was
/// derived from, ready for `confirm_order`.
#[derive(Debug, Clone)]
pub struct OrderProposal {
    pub sku: String,
    pub description: String,
    pub on_hand: i64,
    pub on_order: i64,
    pub daily_sales_avg: f64,
    pub proposed_qty: i64,
    pub order_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub lane: Lane,
    pub protection_period_days: i64,
    pub waste_risk_percent: f64,
    pub waste_risk_note: String,
    pub penalty_applied: bool,
}

/// Builds order proposals from the ledger/lot/demand modules and commits
/// confirmed proposals as ORDER transactions plus order-log records.
pub struct OrderService {
    storage: Arc<dyn Storage>,
    calendar: CalendarConfig,
    mc_defaults: McParams,
    oos_lookback_days: i64,
    window_weeks: i64,
    alpha_boost_for_censored: f64,
    order_seq: AtomicU64,
}

impl OrderService {
    pub fn new(storage: Arc<dyn Storage>, calendar: CalendarConfig, config: &Config) -> Self {
        let mc_defaults = McParams {
            distribution: McDistribution::parse(&config.mc_defaults.distribution),
            n_simulations: config.mc_defaults.n_simulations,
            random_seed: config.mc_defaults.random_seed,
            output_stat: output_stat_of(&config.mc_defaults.output_stat),
            output_percentile: config.mc_defaults.output_percentile,
            expected_waste_rate: 0.0,
        };
        Self {
            storage,
            calendar,
            mc_defaults,
            oos_lookback_days: config.oos_lookback_days,
            window_weeks: 8,
            alpha_boost_for_censored: 0.05,
            order_seq: AtomicU64::new(0),
        }
    }

    fn next_order_id(&self, as_of: NaiveDate) -> String {
        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        format!("ORD-{}-{:06}", as_of.format("%Y%m%d"), seq)
    }

    /// Build a single SKU's order proposal for `as_of`/`lane`.
    pub fn propose_order(&self, sku: &Sku, as_of: NaiveDate, lane: Lane) -> EngineResult<OrderProposal> {
        let (r1, _r2, protection_days) = self.calendar.protection_window(as_of, lane)?;

        let transactions = self.storage.read_transactions()?;
        let sales = self.storage.read_sales()?;
        let lots = self.storage.read_lots()?;

        let mut sku_sales: Vec<_> = sales.iter().filter(|s| s.sku == sku.sku && s.date < as_of).cloned().collect();
        sku_sales.sort_by_key(|s| s.date);

        let history: Vec<HistoryPoint> = sku_sales
            .iter()
            .map(|s| HistoryPoint { date: s.date, qty_sold: s.qty_sold as f64 })
            .collect();

        let censored_flags: Vec<bool> = sku_sales
            .iter()
            .map(|s| is_day_censored(&sku.sku, s.date, &transactions, Some(&sales), self.oos_lookback_days).0)
            .collect();

        let method = demand_method_of(sku.forecast_method);
        let mut mc_params = self.mc_defaults.clone();
        mc_params.expected_waste_rate = 0.0;

        let distribution = build_demand_distribution(BuildParams {
            method,
            history: &history,
            protection_period_days: protection_days,
            censored_flags: Some(&censored_flags),
            alpha_boost_for_censored: self.alpha_boost_for_censored,
            window_weeks: self.window_weeks,
            mc_params: Some(mc_params),
            expected_waste_rate: 0.0,
        });

        let safety_stock = sku
            .safety_stock_override
            .unwrap_or_else(|| safety_stock_for_csl(distribution.sigma_p, sku.target_csl));

        let stock = StockCalculator::calculate_asof(&sku.sku, as_of, &transactions, Some(&sales));
        let inventory_position =
            StockCalculator::inventory_position(&sku.sku, as_of, &transactions, Some(&sales));

        let daily_sales_avg = if protection_days > 0 {
            distribution.mu_p / protection_days as f64
        } else {
            0.0
        };

        let raw_need = (distribution.mu_p + safety_stock - inventory_position as f64).max(0.0);
        let mut proposed_qty = round_up_to_multiple(raw_need.ceil() as i64, sku.pack_size);
        proposed_qty = round_up_to_multiple(proposed_qty, sku.moq.max(1));

        let (waste_risk_percent, _total_at_receipt, _expiring_soon, _expected_waste) =
            fefo::calculate_forward_waste_risk_demand_adjusted(
                &lots,
                r1,
                proposed_qty,
                sku.shelf_life_days,
                sku.min_residual_shelf_life_days,
                sku.waste_horizon_days,
                daily_sales_avg,
            );

        let (adjusted_qty, waste_risk_note, penalty_applied) = fefo::apply_shelf_life_penalty(
            proposed_qty,
            waste_risk_percent,
            sku.waste_risk_threshold,
            penalty_mode_of(sku.waste_penalty_mode),
            sku.waste_penalty_factor,
        );

        let cap = (sku.max_stock - inventory_position).max(0);
        let final_qty = adjusted_qty.min(cap).max(0);

        Ok(OrderProposal {
            sku: sku.sku.clone(),
            description: sku.description.clone(),
            on_hand: stock.on_hand,
            on_order: stock.on_order,
            daily_sales_avg,
            proposed_qty: final_qty,
            order_date: as_of,
            receipt_date: r1,
            lane,
            protection_period_days: protection_days,
            waste_risk_percent,
            waste_risk_note,
            penalty_applied,
        })
    }

    /// Append ORDER events plus matching order-log records for every
    /// proposal with a positive quantity. Checked once before the commit
    /// point; once the batch write starts it runs to completion.
    pub fn confirm_order(
        &self,
        proposals: &[OrderProposal],
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<OrderLog>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut txns = Vec::new();
        let mut logs = Vec::new();

        for proposal in proposals.iter().filter(|p| p.proposed_qty > 0) {
            let order_id = self.next_order_id(proposal.order_date);
            txns.push(
                Transaction::new(proposal.order_date, proposal.sku.clone(), EventKind::Order, proposal.proposed_qty)
                    .with_receipt_date(proposal.receipt_date)
                    .with_note(format!("order {order_id} ({:?} lane)", proposal.lane)),
            );
            logs.push(OrderLog {
                order_id,
                date: proposal.order_date,
                sku: proposal.sku.clone(),
                qty_ordered: proposal.proposed_qty,
                qty_received: 0,
                status: OrderStatus::Pending,
                receipt_date: proposal.receipt_date,
                prebuild_metadata: String::new(),
            });
        }

        if txns.is_empty() {
            return Ok(Vec::new());
        }

        self.storage.append_transactions_batch(&txns)?;
        for log in &logs {
            self.storage.write_order_log(log)?;
            self.storage.append_audit_log(&AuditLogEntry {
                timestamp: chrono::Utc::now(),
                operation: "confirm_order".to_string(),
                sku: Some(log.sku.clone()),
                details: format!("order {} for {} units, receipt {}", log.order_id, log.qty_ordered, log.receipt_date),
                user: None,
                run_id: None,
            })?;
        }

        Ok(logs)
    }
}
