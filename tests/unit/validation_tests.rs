//! Black-box tests for input validation across the replenishment domain:
//! EAN format checks, calendar lane preconditions, and EOD stock entry.

use chrono::NaiveDate;
use replenish_engine::config::Config;
use replenish_engine::domain::calendar::{CalendarConfig, Lane};
use replenish_engine::domain::ledger::validate_ean;
use replenish_engine::domain::models::{DemandVariability, ForecastMethod, WastePenaltyMode};
use replenish_engine::services::daily_close_service::DailyCloseWorkflow;
use std::sync::Arc;
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn ean_validation_accepts_missing_or_blank_codes() {
    assert!(validate_ean(None).is_ok());
    assert!(validate_ean(Some("   ")).is_ok());
}

#[test]
fn ean_validation_accepts_12_or_13_digit_codes() {
    assert!(validate_ean(Some("400638133393")).is_ok());
    assert!(validate_ean(Some("4006381333931")).is_ok());
}

#[test]
fn ean_validation_rejects_non_digit_characters() {
    let err = validate_ean(Some("40063813339X")).unwrap_err();
    assert!(err.contains("digits"));
}

#[test]
fn ean_validation_rejects_the_wrong_length() {
    let err = validate_ean(Some("12345")).unwrap_err();
    assert!(err.contains("12 or 13"));
}

#[test]
fn saturday_lane_rejects_an_order_date_that_is_not_a_friday() {
    let calendar = CalendarConfig::default();
    let monday = d(2026, 1, 5);
    assert!(calendar.next_receipt_date(monday, Lane::Saturday).is_err());
}

#[test]
fn monday_lane_accepts_a_friday_order_date() {
    let calendar = CalendarConfig::default();
    let friday = d(2026, 2, 6);
    assert!(calendar.next_receipt_date(friday, Lane::Monday).is_ok());
}

#[test]
fn negative_eod_stock_is_rejected_before_touching_storage() {
    let dir = tempdir().unwrap();
    let mut config = Config::from_env().unwrap();
    config.data_dir = dir.path().to_path_buf();
    let storage: Arc<dyn replenish_engine::db::Storage> =
        Arc::new(replenish_engine::db::FlatFileStorage::new(&config.data_dir, config.max_backups_per_entity).unwrap());
    storage
        .write_sku(&replenish_engine::domain::models::Sku {
            sku: "SKU001".to_string(),
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
        })
        .unwrap();

    let workflow = DailyCloseWorkflow::new(storage);
    let result = workflow.process_eod_stock("SKU001", d(2026, 1, 1), -5);
    assert!(result.is_err());
}

#[test]
fn eod_stock_for_an_unknown_sku_is_rejected() {
    let dir = tempdir().unwrap();
    let config = {
        let mut c = Config::from_env().unwrap();
        c.data_dir = dir.path().to_path_buf();
        c
    };
    let storage: Arc<dyn replenish_engine::db::Storage> =
        Arc::new(replenish_engine::db::FlatFileStorage::new(&config.data_dir, config.max_backups_per_entity).unwrap());
    let workflow = DailyCloseWorkflow::new(storage);
    let result = workflow.process_eod_stock("UNKNOWN", d(2026, 1, 1), 10);
    assert!(result.is_err());
}
