use super::models::{EventKind, SalesRecord, Transaction};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// Stock state as-of a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stock {
    pub on_hand: i64,
    pub on_order: i64,
    pub unfulfilled_qty: i64,
}

/// Pure, side-effect-free reduction of the ledger into as-of state.
///
/// Future events never retroactively change the past: only transactions
/// strictly before the as-of date are considered.
pub struct StockCalculator;

impl StockCalculator {
    fn sorted_for_sku<'a>(
        sku: &str,
        asof_date: NaiveDate,
        transactions: &'a [Transaction],
        sales_records: Option<&[SalesRecord]>,
    ) -> Vec<Transaction> {
        let mut txns: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.sku == sku && t.date < asof_date)
            .cloned()
            .collect();

        if let Some(sales) = sales_records {
            txns.extend(
                sales
                    .iter()
                    .filter(|s| s.sku == sku && s.date < asof_date)
                    .map(|s| Transaction::new(s.date, s.sku.clone(), EventKind::Sale, s.qty_sold)),
            );
        }

        // Stable sort: insertion order is preserved within equal keys.
        txns.sort_by_key(|t| (t.date, t.event.priority()));
        txns
    }

    /// Reduce the ledger for `sku` as-of `asof_date` (events strictly
    /// before `asof_date` are included).
    pub fn calculate_asof(
        sku: &str,
        asof_date: NaiveDate,
        transactions: &[Transaction],
        sales_records: Option<&[SalesRecord]>,
    ) -> Stock {
        let mut on_hand: i64 = 0;
        let mut on_order: i64 = 0;
        let mut unfulfilled_qty: i64 = 0;

        for txn in Self::sorted_for_sku(sku, asof_date, transactions, sales_records) {
            match txn.event {
                EventKind::Snapshot => {
                    on_hand = txn.qty;
                    on_order = 0;
                }
                EventKind::Order => on_order += txn.qty,
                EventKind::Receipt => {
                    on_order = (on_order - txn.qty).max(0);
                    on_hand += txn.qty;
                }
                EventKind::Sale | EventKind::Waste => {
                    on_hand = (on_hand - txn.qty).max(0);
                }
                EventKind::Adjust => on_hand = txn.qty.max(0),
                EventKind::Unfulfilled => unfulfilled_qty += txn.qty,
                EventKind::AssortmentIn | EventKind::AssortmentOut => {}
            }
        }

        Stock {
            on_hand: on_hand.max(0),
            on_order: on_order.max(0),
            unfulfilled_qty: unfulfilled_qty.max(0),
        }
    }

    /// Net pending ORDER quantities grouped by receipt_date, matched
    /// against RECEIPTs by receipt_date.
    pub fn on_order_by_date(
        sku: &str,
        transactions: &[Transaction],
        cutoff: NaiveDate,
    ) -> HashMap<NaiveDate, i64> {
        let mut ordered: HashMap<NaiveDate, i64> = HashMap::new();
        let mut received: HashMap<NaiveDate, i64> = HashMap::new();

        for txn in transactions {
            if txn.sku != sku || txn.date >= cutoff {
                continue;
            }
            let Some(receipt_date) = txn.receipt_date else {
                continue;
            };
            match txn.event {
                EventKind::Order => *ordered.entry(receipt_date).or_insert(0) += txn.qty,
                EventKind::Receipt => *received.entry(receipt_date).or_insert(0) += txn.qty,
                _ => {}
            }
        }

        ordered
            .into_iter()
            .filter_map(|(date, qty)| {
                let pending = qty - received.get(&date).copied().unwrap_or(0);
                (pending > 0).then_some((date, pending))
            })
            .collect()
    }

    /// `on_hand + on_order arriving <= as_of_date - unfulfilled_qty`.
    pub fn inventory_position(
        sku: &str,
        as_of_date: NaiveDate,
        transactions: &[Transaction],
        sales_records: Option<&[SalesRecord]>,
    ) -> i64 {
        let stock = Self::calculate_asof(sku, as_of_date, transactions, sales_records);
        let pending = Self::on_order_by_date(sku, transactions, as_of_date);
        let arriving: i64 = pending
            .into_iter()
            .filter(|(date, _)| *date <= as_of_date)
            .map(|(_, qty)| qty)
            .sum();
        stock.on_hand + arriving - stock.unfulfilled_qty
    }
}

/// `(qty_sold, adjustment)`; preserves mass balance: start + receipts -
/// waste - sales - adjust = declared.
pub fn calculate_sold_from_eod_stock(
    sku: &str,
    eod_date: NaiveDate,
    eod_stock_on_hand: i64,
    transactions: &[Transaction],
    sales_records: Option<&[SalesRecord]>,
) -> (i64, i64) {
    let next_day = eod_date + Duration::days(1);

    let sales_without_today: Option<Vec<SalesRecord>> =
        sales_records.map(|sales| sales.iter().filter(|s| s.date != eod_date).cloned().collect());

    let theoretical_end = StockCalculator::calculate_asof(
        sku,
        next_day,
        transactions,
        sales_without_today.as_deref(),
    );

    let qty_sold = (theoretical_end.on_hand - eod_stock_on_hand).max(0);
    let theoretical_after_sales = theoretical_end.on_hand - qty_sold;
    let adjustment = eod_stock_on_hand - theoretical_after_sales;

    (qty_sold, adjustment)
}

/// `(censored, reason)`: censored iff EOD on_hand==0 and sales==0, or any
/// UNFULFILLED event within the lookback window.
pub fn is_day_censored(
    sku: &str,
    check_date: NaiveDate,
    transactions: &[Transaction],
    sales_records: Option<&[SalesRecord]>,
    lookback_days: i64,
) -> (bool, String) {
    let next_day = check_date + Duration::days(1);
    let stock_eod = StockCalculator::calculate_asof(sku, next_day, transactions, sales_records);

    let sales_qty: i64 = sales_records
        .map(|sales| {
            sales
                .iter()
                .filter(|s| s.sku == sku && s.date == check_date)
                .map(|s| s.qty_sold)
                .sum()
        })
        .unwrap_or(0);

    if stock_eod.on_hand == 0 && sales_qty == 0 {
        return (true, format!("OH=0 and sales=0 on {check_date}"));
    }

    let lookback_start = check_date - Duration::days(lookback_days);
    let most_recent_unfulfilled = transactions
        .iter()
        .filter(|t| {
            t.sku == sku
                && t.event == EventKind::Unfulfilled
                && lookback_start <= t.date
                && t.date <= check_date
        })
        .map(|t| t.date)
        .max();

    if let Some(date) = most_recent_unfulfilled {
        return (
            true,
            format!("UNFULFILLED event on {date} (within {lookback_days}-day lookback)"),
        );
    }

    (false, "Normal demand observation".to_string())
}

/// Basic EAN-13/EAN-12 format validation. Empty/None is valid.
pub fn validate_ean(ean: Option<&str>) -> Result<(), String> {
    let Some(ean) = ean.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    if !ean.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("EAN must contain only digits, got: {ean}"));
    }
    if ean.len() != 12 && ean.len() != 13 {
        return Err(format!("EAN must be 12 or 13 digits, got {} digits", ean.len()));
    }
    Ok(())
}
