//! Contract tests for the storage layer: every backend exposed through
//! the `Storage` trait round-trips the same data, and the adapter reports
//! the backend it is actually routing to.

use chrono::NaiveDate;
use replenish_engine::config::{Config, MonteCarloDefaults, StorageBackend};
use replenish_engine::db::{FlatFileStorage, Storage, StorageAdapter};
use replenish_engine::domain::models::{
    AuditLogEntry, DemandVariability, ForecastMethod, Lot, OrderLog, OrderStatus, Sku, Transaction,
    WastePenaltyMode,
};
use replenish_engine::domain::models::EventKind;
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn test_config(data_dir: std::path::PathBuf) -> Config {
    Config {
        storage_backend: StorageBackend::Flatfile,
        data_dir,
        database_path: "./unused.db".into(),
        lead_time_days_default: 1,
        order_days: vec![0, 1, 2, 3, 4],
        delivery_days: vec![0, 1, 2, 3, 4, 5],
        oos_lookback_days: 30,
        mc_defaults: MonteCarloDefaults::default(),
        expiry_alert_critical_days: 3,
        expiry_alert_warning_days: 7,
        holiday_json_path: None,
        max_backups_per_entity: 5,
        log_level: "info".to_string(),
        app_name: "test".to_string(),
        app_version: "0.0.0".to_string(),
    }
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

fn exercise_round_trip(storage: &dyn Storage) {
    storage.write_sku(&sku("SKU001")).unwrap();
    let skus = storage.read_skus().unwrap();
    assert_eq!(skus.len(), 1);
    assert_eq!(skus[0].sku, "SKU001");

    let mut updated = skus[0].clone();
    updated.max_stock = 999;
    assert!(storage.update_sku(&updated).unwrap());
    assert_eq!(storage.read_skus().unwrap()[0].max_stock, 999);

    storage.append_transaction(&Transaction::new(d(2026, 1, 1), "SKU001", EventKind::Snapshot, 50)).unwrap();
    assert_eq!(storage.read_transactions().unwrap().len(), 1);

    let lot = Lot {
        lot_id: "LOT-1".to_string(),
        sku: "SKU001".to_string(),
        expiry_date: Some(d(2026, 6, 1)),
        qty_on_hand: 20,
        receipt_id: "R1".to_string(),
        receipt_date: d(2026, 1, 1),
    };
    storage.write_lot(&lot).unwrap();
    assert_eq!(storage.read_lots().unwrap().len(), 1);

    storage
        .write_order_log(&OrderLog {
            order_id: "ORD-1".to_string(),
            date: d(2026, 1, 1),
            sku: "SKU001".to_string(),
            qty_ordered: 40,
            qty_received: 0,
            status: OrderStatus::Pending,
            receipt_date: d(2026, 1, 3),
            prebuild_metadata: String::new(),
        })
        .unwrap();
    assert!(storage.update_order_received_qty("ORD-1", 40, OrderStatus::Received).unwrap());
    let orders = storage.read_order_logs().unwrap();
    assert_eq!(orders[0].status, OrderStatus::Received);

    storage
        .append_audit_log(&AuditLogEntry {
            timestamp: chrono::Utc::now(),
            operation: "test".to_string(),
            sku: Some("SKU001".to_string()),
            details: "round trip check".to_string(),
            user: None,
            run_id: None,
        })
        .unwrap();
    assert_eq!(storage.read_audit_log(None, None).unwrap().len(), 1);

    assert!(storage.delete_sku("SKU001").unwrap());
    assert!(storage.read_skus().unwrap().is_empty());
}

#[test]
fn flatfile_backend_round_trips_every_entity_family() {
    let dir = tempdir().unwrap();
    let storage = FlatFileStorage::new(dir.path(), 5).unwrap();
    assert_eq!(storage.backend_name(), "flatfile");
    exercise_round_trip(&storage);
}

#[test]
fn adapter_in_flatfile_mode_reports_flatfile_and_round_trips_through_the_route_layer() {
    let dir = tempdir().unwrap();
    let adapter = StorageAdapter::new(&test_config(dir.path().to_path_buf())).unwrap();
    assert_eq!(adapter.backend_name(), "flatfile");
    exercise_round_trip(&adapter);
}

#[test]
fn adapter_in_database_mode_reports_sqlite_and_round_trips_through_the_route_layer() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.storage_backend = StorageBackend::Database;
    config.database_path = dir.path().join("engine.db");
    let adapter = StorageAdapter::new(&config).unwrap();
    assert_eq!(adapter.backend_name(), "sqlite");
    exercise_round_trip(&adapter);
}

#[test]
fn receiving_document_existence_is_false_until_a_matching_log_is_written() {
    let dir = tempdir().unwrap();
    let storage = FlatFileStorage::new(dir.path(), 5).unwrap();
    assert!(!storage.receiving_document_exists("DDT-1").unwrap());
    storage
        .write_receiving_log(&replenish_engine::domain::models::ReceivingLog {
            document_id: "DDT-1".to_string(),
            receipt_id: "DDT-1".to_string(),
            date: d(2026, 1, 1),
            sku: "SKU001".to_string(),
            qty_received: 10,
            receipt_date: d(2026, 1, 1),
            order_ids: String::new(),
        })
        .unwrap();
    assert!(storage.receiving_document_exists("DDT-1").unwrap());
}
