//! Black-box tests for ledger reduction, EOD attribution, and censoring.

use chrono::NaiveDate;
use replenish_engine::domain::ledger::{
    calculate_sold_from_eod_stock, is_day_censored, validate_ean, StockCalculator,
};
use replenish_engine::domain::models::{EventKind, SalesRecord, Transaction};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn snapshot_resets_on_hand_and_clears_pending_orders() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Order, 50),
        Transaction::new(d(2026, 1, 2), "SKU001", EventKind::Snapshot, 100),
    ];
    let stock = StockCalculator::calculate_asof("SKU001", d(2026, 1, 3), &txns, None);
    assert_eq!(stock.on_hand, 100);
    assert_eq!(stock.on_order, 0);
}

#[test]
fn receipt_moves_quantity_from_on_order_to_on_hand() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 0),
        Transaction::new(d(2026, 1, 2), "SKU001", EventKind::Order, 30),
        Transaction::new(d(2026, 1, 5), "SKU001", EventKind::Receipt, 30),
    ];
    let stock = StockCalculator::calculate_asof("SKU001", d(2026, 1, 6), &txns, None);
    assert_eq!(stock.on_hand, 30);
    assert_eq!(stock.on_order, 0);
}

#[test]
fn future_events_do_not_affect_an_earlier_as_of_date() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 50),
        Transaction::new(d(2026, 6, 1), "SKU001", EventKind::Waste, 50),
    ];
    let stock = StockCalculator::calculate_asof("SKU001", d(2026, 2, 1), &txns, None);
    assert_eq!(stock.on_hand, 50);
}

#[test]
fn on_hand_never_goes_negative() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 5),
        Transaction::new(d(2026, 1, 2), "SKU001", EventKind::Sale, 20),
    ];
    let stock = StockCalculator::calculate_asof("SKU001", d(2026, 1, 3), &txns, None);
    assert_eq!(stock.on_hand, 0);
}

#[test]
fn stable_sort_preserves_insertion_order_for_same_day_same_priority_events() {
    // Two SNAPSHOTs on the same date: last one appended wins, matching the
    // order they were read from the ledger.
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 10),
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 25),
    ];
    let stock = StockCalculator::calculate_asof("SKU001", d(2026, 1, 2), &txns, None);
    assert_eq!(stock.on_hand, 25);
}

#[test]
fn inventory_position_nets_unfulfilled_demand() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 20),
        Transaction::new(d(2026, 1, 2), "SKU001", EventKind::Unfulfilled, 5),
    ];
    let position = StockCalculator::inventory_position("SKU001", d(2026, 1, 3), &txns, None);
    assert_eq!(position, 15);
}

#[test]
fn eod_stock_below_theoretical_is_attributed_entirely_to_sales() {
    let txns = vec![Transaction::new(d(2025, 12, 31), "SKU001", EventKind::Snapshot, 100)];
    let (qty_sold, adjustment) = calculate_sold_from_eod_stock("SKU001", d(2026, 1, 1), 75, &txns, None);
    assert_eq!(qty_sold, 25);
    assert_eq!(adjustment, 0);
}

#[test]
fn eod_stock_above_theoretical_is_an_upward_adjustment() {
    let txns = vec![Transaction::new(d(2025, 12, 31), "SKU001", EventKind::Snapshot, 50)];
    let (qty_sold, adjustment) = calculate_sold_from_eod_stock("SKU001", d(2026, 1, 1), 60, &txns, None);
    assert_eq!(qty_sold, 0);
    assert_eq!(adjustment, 10);
}

#[test]
fn a_day_with_zero_stock_and_zero_sales_is_censored() {
    let txns = vec![Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 0)];
    let (censored, reason) = is_day_censored("SKU001", d(2026, 1, 1), &txns, None, 7);
    assert!(censored);
    assert!(reason.contains("OH=0"));
}

#[test]
fn an_unfulfilled_event_within_the_lookback_window_censors_the_day() {
    let txns = vec![
        Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 10),
        Transaction::new(d(2026, 1, 3), "SKU001", EventKind::Unfulfilled, 4),
    ];
    let (censored, _reason) = is_day_censored("SKU001", d(2026, 1, 5), &txns, None, 7);
    assert!(censored);
}

#[test]
fn a_normal_demand_day_is_not_censored() {
    let txns = vec![Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 10)];
    let sales = vec![SalesRecord { date: d(2026, 1, 2), sku: "SKU001".to_string(), qty_sold: 3, promo_flag: false }];
    let (censored, reason) = is_day_censored("SKU001", d(2026, 1, 2), &txns, Some(&sales), 7);
    assert!(!censored);
    assert_eq!(reason, "Normal demand observation");
}

#[test]
fn validate_ean_accepts_empty_and_valid_lengths_and_rejects_the_rest() {
    assert!(validate_ean(None).is_ok());
    assert!(validate_ean(Some("")).is_ok());
    assert!(validate_ean(Some("123456789012")).is_ok());
    assert!(validate_ean(Some("1234567890123")).is_ok());
    assert!(validate_ean(Some("12345")).is_err());
    assert!(validate_ean(Some("12345678901a")).is_err());
}
