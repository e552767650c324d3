//! Contract tests for the propose/confirm order workflow: order-id
//! uniqueness, zero-quantity proposals never get confirmed, and confirmed
//! orders round-trip through the ledger.

use chrono::NaiveDate;
use replenish_engine::config::Config;
use replenish_engine::db::{FlatFileStorage, Storage};
use replenish_engine::domain::calendar::{CalendarConfig, Lane};
use replenish_engine::domain::models::{
    DemandVariability, EventKind, ForecastMethod, Sku, Transaction, WastePenaltyMode,
};
use replenish_engine::services::order_service::OrderService;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sku(id: &str, max_stock: i64) -> Sku {
    Sku {
        sku: id.to_string(),
        description: "Widget".to_string(),
        ean: None,
        moq: 1,
        pack_size: 1,
        lead_time_days: 1,
        review_period_days: 7,
        safety_stock_override: Some(0.0),
        shelf_life_days: 0,
        min_residual_shelf_life_days: 0,
        reorder_point: None,
        max_stock,
        demand_variability: DemandVariability::Stable,
        target_csl: 0.95,
        forecast_method: ForecastMethod::Simple,
        waste_penalty_mode: WastePenaltyMode::None,
        waste_penalty_factor: 0.0,
        waste_risk_threshold: 100.0,
        waste_horizon_days: 0,
        in_assortment: true,
    }
}

fn service(storage: Arc<dyn Storage>) -> OrderService {
    let mut config = Config::from_env().unwrap();
    config.oos_lookback_days = 7;
    OrderService::new(storage, CalendarConfig::default(), &config)
}

#[test]
fn a_sku_already_at_max_stock_proposes_a_zero_quantity_order() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    let test_sku = sku("SKU001", 10);
    storage.write_sku(&test_sku).unwrap();
    storage
        .append_transaction(&Transaction::new(d(2025, 12, 1), "SKU001", EventKind::Snapshot, 10))
        .unwrap();

    let workflow = service(storage);
    let proposal = workflow.propose_order(&test_sku, d(2026, 1, 5), Lane::Standard).unwrap();
    assert_eq!(proposal.proposed_qty, 0);
}

#[test]
fn confirming_a_batch_of_proposals_skips_zero_quantity_ones_and_assigns_unique_order_ids() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    let low_stock = sku("SKU001", 500);
    let full_stock = sku("SKU002", 10);
    storage.write_sku(&low_stock).unwrap();
    storage.write_sku(&full_stock).unwrap();
    storage
        .append_transaction(&Transaction::new(d(2025, 12, 1), "SKU001", EventKind::Snapshot, 0))
        .unwrap();
    storage
        .append_transaction(&Transaction::new(d(2025, 12, 1), "SKU002", EventKind::Snapshot, 10))
        .unwrap();

    let workflow = service(storage.clone());
    let as_of = d(2026, 1, 5);
    let proposals = vec![
        workflow.propose_order(&low_stock, as_of, Lane::Standard).unwrap(),
        workflow.propose_order(&full_stock, as_of, Lane::Standard).unwrap(),
    ];

    let cancel = CancellationToken::new();
    let logs = workflow.confirm_order(&proposals, &cancel).unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].sku, "SKU001");
    assert!(logs[0].order_id.starts_with("ORD-20260105-"));

    let order_logs = storage.read_order_logs().unwrap();
    assert_eq!(order_logs.len(), 1);
}

#[test]
fn confirm_order_refuses_to_proceed_on_an_already_cancelled_token() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    let workflow = service(storage);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(workflow.confirm_order(&[], &cancel).is_err());
}
