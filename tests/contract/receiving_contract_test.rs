//! Contract tests for receiving reconciliation: FIFO allocation across
//! multiple open orders, order-scoped allocation, and status transitions.

use chrono::NaiveDate;
use replenish_engine::db::{FlatFileStorage, Storage};
use replenish_engine::domain::models::{
    DemandVariability, ForecastMethod, OrderLog, OrderStatus, Sku, WastePenaltyMode,
};
use replenish_engine::services::receiving_service::{ReceivingItem, ReceivingWorkflow};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sku(id: &str) -> Sku {
    Sku {
        sku: id.to_string(),
        description: "Widget".to_string(),
        ean: None,
        moq: 1,
        pack_size: 1,
        lead_time_days: 1,
        review_period_days: 7,
        safety_stock_override: None,
        shelf_life_days: 0,
        min_residual_shelf_life_days: 0,
        reorder_point: None,
        max_stock: 500,
        demand_variability: DemandVariability::Stable,
        target_csl: 0.95,
        forecast_method: ForecastMethod::Simple,
        waste_penalty_mode: WastePenaltyMode::None,
        waste_penalty_factor: 0.0,
        waste_risk_threshold: 0.0,
        waste_horizon_days: 0,
        in_assortment: true,
    }
}

fn order(order_id: &str, date: NaiveDate, sku_id: &str, qty_ordered: i64) -> OrderLog {
    OrderLog {
        order_id: order_id.to_string(),
        date,
        sku: sku_id.to_string(),
        qty_ordered,
        qty_received: 0,
        status: OrderStatus::Pending,
        receipt_date: date,
        prebuild_metadata: String::new(),
    }
}

#[test]
fn fifo_allocation_fills_the_oldest_open_order_first_and_splits_the_remainder() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    storage.write_sku(&sku("SKU001")).unwrap();
    storage.write_order_log(&order("ORD-1", d(2026, 1, 1), "SKU001", 30)).unwrap();
    storage.write_order_log(&order("ORD-2", d(2026, 1, 2), "SKU001", 40)).unwrap();

    let workflow = ReceivingWorkflow::new(storage);
    let items = vec![ReceivingItem { sku: "SKU001".to_string(), qty_received: 50, order_ids: None }];
    let cancel = CancellationToken::new();

    let outcome = workflow.close_receipt_by_document("DDT-10", d(2026, 1, 5), &items, "", &cancel).unwrap();
    assert_eq!(outcome.order_updates.len(), 2);

    let first = outcome.order_updates.iter().find(|u| u.order_id == "ORD-1").unwrap();
    assert_eq!(first.qty_received_total, 30);
    assert_eq!(first.new_status, OrderStatus::Received);

    let second = outcome.order_updates.iter().find(|u| u.order_id == "ORD-2").unwrap();
    assert_eq!(second.qty_received_total, 20);
    assert_eq!(second.new_status, OrderStatus::Partial);
}

#[test]
fn an_explicit_order_id_list_restricts_allocation_to_those_orders() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    storage.write_sku(&sku("SKU001")).unwrap();
    storage.write_order_log(&order("ORD-1", d(2026, 1, 1), "SKU001", 30)).unwrap();
    storage.write_order_log(&order("ORD-2", d(2026, 1, 2), "SKU001", 40)).unwrap();

    let workflow = ReceivingWorkflow::new(storage);
    let items =
        vec![ReceivingItem { sku: "SKU001".to_string(), qty_received: 40, order_ids: Some(vec!["ORD-2".to_string()]) }];
    let cancel = CancellationToken::new();

    let outcome = workflow.close_receipt_by_document("DDT-11", d(2026, 1, 5), &items, "", &cancel).unwrap();
    assert_eq!(outcome.order_updates.len(), 1);
    assert_eq!(outcome.order_updates[0].order_id, "ORD-2");
    assert_eq!(outcome.order_updates[0].new_status, OrderStatus::Received);
}

#[test]
fn partial_receipt_moves_an_order_from_pending_to_partial_not_received() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    storage.write_sku(&sku("SKU001")).unwrap();
    storage.write_order_log(&order("ORD-1", d(2026, 1, 1), "SKU001", 100)).unwrap();

    let workflow = ReceivingWorkflow::new(storage);
    let items = vec![ReceivingItem { sku: "SKU001".to_string(), qty_received: 25, order_ids: None }];
    let cancel = CancellationToken::new();

    let outcome = workflow.close_receipt_by_document("DDT-12", d(2026, 1, 5), &items, "", &cancel).unwrap();
    assert_eq!(outcome.order_updates[0].new_status, OrderStatus::Partial);
    assert_eq!(outcome.order_updates[0].qty_received_total, 25);
}

#[test]
fn receiving_is_refused_once_the_cancellation_token_fires() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FlatFileStorage::new(dir.path(), 5).unwrap());
    storage.write_sku(&sku("SKU001")).unwrap();

    let workflow = ReceivingWorkflow::new(storage);
    let items = vec![ReceivingItem { sku: "SKU001".to_string(), qty_received: 10, order_ids: None }];
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(workflow.close_receipt_by_document("DDT-13", d(2026, 1, 5), &items, "", &cancel).is_err());
}
