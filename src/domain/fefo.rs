use super::models::Lot;
use crate::error::{EngineError, EngineResult};
use chrono::{Duration, NaiveDate};

fn days_until_expiry(lot: &Lot, check_date: NaiveDate) -> Option<i64> {
    lot.expiry_date.map(|exp| (exp - check_date).num_days())
}

/// Sort lots FEFO: ascending expiry, lots without expiry last.
pub fn sort_fefo(lots: &mut [Lot]) {
    lots.sort_by(|a, b| match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Per-lot consumption trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRecord {
    pub lot_id: String,
    pub qty_consumed: i64,
    pub expiry_date: Option<NaiveDate>,
    pub qty_remaining: i64,
}

/// Consume `qty_to_consume` from `lots` (already FEFO-sorted), deducting
/// from each lot up to its available quantity. Lots left at qty=0 are
/// dropped from the returned (updated) lot list. A no-op (empty trace) when
/// `lots` is empty — SKUs with no lot tracking are untouched.
pub fn consume_from_lots(
    sku: &str,
    qty_to_consume: i64,
    lots: &[Lot],
) -> EngineResult<(Vec<ConsumptionRecord>, Vec<Lot>)> {
    if lots.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let total_available: i64 = lots.iter().map(|l| l.qty_on_hand).sum();
    if total_available < qty_to_consume {
        return Err(EngineError::InsufficientLotStock {
            sku: sku.to_string(),
            requested: qty_to_consume,
            available: total_available,
        });
    }

    let mut sorted = lots.to_vec();
    sort_fefo(&mut sorted);

    let mut records = Vec::new();
    let mut remaining = qty_to_consume;
    let mut updated = Vec::new();

    for mut lot in sorted {
        if remaining <= 0 {
            updated.push(lot);
            continue;
        }
        let qty_from_lot = lot.qty_on_hand.min(remaining);
        lot.qty_on_hand -= qty_from_lot;
        remaining -= qty_from_lot;

        records.push(ConsumptionRecord {
            lot_id: lot.lot_id.clone(),
            qty_consumed: qty_from_lot,
            expiry_date: lot.expiry_date,
            qty_remaining: lot.qty_on_hand,
        });

        if lot.qty_on_hand > 0 {
            updated.push(lot);
        }
        // qty_on_hand == 0 lots are garbage-collected
    }

    Ok((records, updated))
}

/// Serialize a FEFO trace into the transaction-note format
/// `FEFO: lot1:q(exp:date), lot2:q(exp:date), …`.
pub fn format_fefo_note(records: &[ConsumptionRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = records
        .iter()
        .map(|r| {
            let exp_str = r
                .expiry_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "no expiry".to_string());
            format!("{}:{}pz(exp:{})", r.lot_id, r.qty_consumed, exp_str)
        })
        .collect();
    format!("FEFO: {}", parts.join(", "))
}

/// Shelf-life bucket breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsableStockResult {
    pub total_on_hand: i64,
    pub usable_qty: i64,
    pub unusable_qty: i64,
    pub expiring_soon_qty: i64,
    pub waste_risk_percent: f64,
}

/// Each lot contributes to one bucket: unusable, expiring-soon, or usable.
pub fn calculate_usable_stock(
    lots: &[Lot],
    check_date: NaiveDate,
    min_shelf_life_days: i64,
    waste_horizon_days: i64,
) -> UsableStockResult {
    let total_on_hand: i64 = lots.iter().filter(|l| l.qty_on_hand > 0).map(|l| l.qty_on_hand).sum();

    if min_shelf_life_days == 0 {
        return UsableStockResult {
            total_on_hand,
            usable_qty: total_on_hand,
            unusable_qty: 0,
            expiring_soon_qty: 0,
            waste_risk_percent: 0.0,
        };
    }

    let mut usable_qty = 0;
    let mut unusable_qty = 0;
    let mut expiring_soon_qty = 0;

    for lot in lots {
        if lot.qty_on_hand <= 0 {
            continue;
        }
        if lot.expiry_date.is_none() {
            usable_qty += lot.qty_on_hand;
            continue;
        }
        let days_left = days_until_expiry(lot, check_date).unwrap();
        if days_left < 0 || days_left < min_shelf_life_days {
            unusable_qty += lot.qty_on_hand;
        } else if days_left <= waste_horizon_days {
            usable_qty += lot.qty_on_hand;
            expiring_soon_qty += lot.qty_on_hand;
        } else {
            usable_qty += lot.qty_on_hand;
        }
    }

    let waste_risk_percent = if total_on_hand > 0 {
        expiring_soon_qty as f64 / total_on_hand as f64 * 100.0
    } else {
        0.0
    };

    UsableStockResult {
        total_on_hand,
        usable_qty,
        unusable_qty,
        expiring_soon_qty,
        waste_risk_percent,
    }
}

fn virtual_incoming_lot(receipt_date: NaiveDate, qty: i64, shelf_life_days: i64) -> Lot {
    let expiry_date = (shelf_life_days > 0).then(|| receipt_date + Duration::days(shelf_life_days));
    Lot {
        lot_id: "VIRTUAL_INCOMING".to_string(),
        sku: "VIRTUAL".to_string(),
        expiry_date,
        qty_on_hand: qty,
        receipt_id: "VIRTUAL".to_string(),
        receipt_date,
    }
}

/// `(waste_risk_percent, total_stock_at_receipt, expiring_soon_qty)`,
/// projecting lots + a virtual incoming lot forward to `receipt_date`.
pub fn calculate_forward_waste_risk(
    lots: &[Lot],
    receipt_date: NaiveDate,
    proposed_qty: i64,
    sku_shelf_life_days: i64,
    min_shelf_life_days: i64,
    waste_horizon_days: i64,
) -> (f64, i64, i64) {
    if proposed_qty <= 0 {
        let r = calculate_usable_stock(lots, receipt_date, min_shelf_life_days, waste_horizon_days);
        return (r.waste_risk_percent, r.total_on_hand, r.expiring_soon_qty);
    }

    let incoming = virtual_incoming_lot(receipt_date, proposed_qty, sku_shelf_life_days);
    let mut combined = lots.to_vec();
    combined.push(incoming);

    let r = calculate_usable_stock(&combined, receipt_date, min_shelf_life_days, waste_horizon_days);
    (r.waste_risk_percent, r.total_on_hand, r.expiring_soon_qty)
}

fn calculate_expected_waste(
    lots: &[Lot],
    check_date: NaiveDate,
    min_shelf_life_days: i64,
    waste_horizon_days: i64,
    forecast_daily_demand: f64,
) -> i64 {
    struct ExpiringLot {
        qty: i64,
        days_until_expiry: i64,
    }

    let mut expiring: Vec<ExpiringLot> = lots
        .iter()
        .filter(|l| l.qty_on_hand > 0 && l.expiry_date.is_some())
        .filter_map(|l| {
            let days_left = days_until_expiry(l, check_date).unwrap();
            (days_left >= min_shelf_life_days && days_left <= waste_horizon_days).then_some(
                ExpiringLot {
                    qty: l.qty_on_hand,
                    days_until_expiry: days_left,
                },
            )
        })
        .collect();

    if forecast_daily_demand <= 0.0 {
        return expiring.iter().map(|l| l.qty).sum();
    }

    if expiring.is_empty() {
        return 0;
    }

    expiring.sort_by_key(|l| l.days_until_expiry);

    let mut total_expected_waste: i64 = 0;
    let mut cumulative_demand_days: f64 = 0.0;

    for lot in &expiring {
        let demand_window_days = (lot.days_until_expiry as f64 - cumulative_demand_days).max(0.0);
        let expected_demand_in_window = forecast_daily_demand * demand_window_days;
        let waste_from_lot = (lot.qty as f64 - expected_demand_in_window).max(0.0);
        total_expected_waste += waste_from_lot as i64;

        let consumed_from_lot = (lot.qty as f64).min(expected_demand_in_window);
        if consumed_from_lot > 0.0 {
            cumulative_demand_days += consumed_from_lot / forecast_daily_demand;
        }
    }

    total_expected_waste
}

/// `(adjusted_waste_risk_percent, total_stock_at_receipt, raw_expiring_soon,
/// expected_waste)` When `forecast_daily_demand <= 0` the
/// expected waste degenerates to the raw expiring-soon quantity.
pub fn calculate_forward_waste_risk_demand_adjusted(
    lots: &[Lot],
    receipt_date: NaiveDate,
    proposed_qty: i64,
    sku_shelf_life_days: i64,
    min_shelf_life_days: i64,
    waste_horizon_days: i64,
    forecast_daily_demand: f64,
) -> (f64, i64, i64, i64) {
    let combined: Vec<Lot> = if proposed_qty > 0 {
        let incoming = virtual_incoming_lot(receipt_date, proposed_qty, sku_shelf_life_days);
        let mut c = lots.to_vec();
        c.push(incoming);
        c
    } else {
        lots.to_vec()
    };

    let forward = calculate_usable_stock(&combined, receipt_date, min_shelf_life_days, waste_horizon_days);
    let expected_waste = calculate_expected_waste(
        &combined,
        receipt_date,
        min_shelf_life_days,
        waste_horizon_days,
        forecast_daily_demand,
    );

    let total_stock = forward.total_on_hand;
    let adjusted_risk = if total_stock > 0 {
        expected_waste as f64 / total_stock as f64 * 100.0
    } else {
        0.0
    };

    (adjusted_risk, total_stock, forward.expiring_soon_qty, expected_waste)
}

/// Waste-penalty mode, matching `crate::domain::models::WastePenaltyMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyMode {
    None,
    Soft,
    Hard,
}

/// `(adjusted_qty, reason, penalty_applied)`; the bool disambiguates a
/// hard-mode block (qty=0, penalty_applied=true) from a proposal that was
/// already zero before any penalty.
pub fn apply_shelf_life_penalty(
    proposed_qty: i64,
    waste_risk_percent: f64,
    waste_risk_threshold: f64,
    mode: PenaltyMode,
    penalty_factor: f64,
) -> (i64, String, bool) {
    if waste_risk_percent < waste_risk_threshold {
        return (proposed_qty, String::new(), false);
    }

    match mode {
        PenaltyMode::Hard => (
            0,
            format!(
                "BLOCKED: waste risk {waste_risk_percent:.1}% >= {waste_risk_threshold}% (hard mode)"
            ),
            true,
        ),
        PenaltyMode::Soft => {
            let adjusted_qty = (proposed_qty as f64 * (1.0 - penalty_factor)).floor() as i64;
            (
                adjusted_qty,
                format!(
                    "reduced by {:.0}% (waste risk {waste_risk_percent:.1}%)",
                    penalty_factor * 100.0
                ),
                true,
            )
        }
        PenaltyMode::None => (proposed_qty, String::new(), false),
    }
}
