//! Black-box tests for the order/delivery calendar and holiday rules.

use chrono::NaiveDate;
use replenish_engine::domain::calendar::{
    easter_sunday, CalendarConfig, HolidayCalendar, HolidayEffect, HolidayRule, HolidayRuleType, Lane,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn default_calendar_orders_monday_through_friday_and_delivers_monday_through_saturday() {
    let calendar = CalendarConfig::default();
    // Monday 2026-01-05 through Sunday 2026-01-11
    assert!(calendar.is_order_day(d(2026, 1, 5))); // Mon
    assert!(calendar.is_order_day(d(2026, 1, 9))); // Fri
    assert!(!calendar.is_order_day(d(2026, 1, 10))); // Sat
    assert!(!calendar.is_order_day(d(2026, 1, 11))); // Sun

    assert!(calendar.is_delivery_day(d(2026, 1, 10))); // Sat
    assert!(!calendar.is_delivery_day(d(2026, 1, 11))); // Sun
}

#[test]
fn next_delivery_day_skips_non_delivery_days() {
    let calendar = CalendarConfig::default();
    // Sunday 2026-01-11 isn't a delivery day; the next one is Monday.
    let next = calendar.next_delivery_day(d(2026, 1, 11)).unwrap();
    assert_eq!(next, d(2026, 1, 12));
}

#[test]
fn next_order_opportunity_scans_past_weekend() {
    let calendar = CalendarConfig::default();
    // Friday is an order day; the next opportunity after it is Monday.
    let next = calendar.next_order_opportunity(d(2026, 1, 9));
    assert_eq!(next, d(2026, 1, 12));
}

#[test]
fn saturday_and_monday_lanes_require_a_friday_order_date() {
    let calendar = CalendarConfig::default();
    let thursday = d(2026, 1, 8);
    assert!(calendar.next_receipt_date(thursday, Lane::Saturday).is_err());
    assert!(calendar.next_receipt_date(thursday, Lane::Monday).is_err());
}

#[test]
fn friday_dual_lane_protection_windows_match_known_values() {
    let calendar = CalendarConfig::default();
    let friday = d(2026, 2, 6);

    let (saturday_window, monday_window) = calendar.get_friday_lanes(friday).unwrap();
    assert_eq!(saturday_window, (d(2026, 2, 7), d(2026, 2, 10), 3));
    assert_eq!(monday_window, (d(2026, 2, 9), d(2026, 2, 10), 1));
}

#[test]
fn standard_lane_protection_window_is_never_negative() {
    let calendar = CalendarConfig::default();
    let (r1, r2, protection_days) = calendar.protection_window(d(2026, 1, 5), Lane::Standard).unwrap();
    assert!(r1 <= r2);
    assert!(protection_days >= 0);
}

#[test]
fn easter_sunday_matches_known_dates() {
    assert_eq!(easter_sunday(2026), d(2026, 4, 5));
    assert_eq!(easter_sunday(2024), d(2024, 3, 31));
}

#[test]
fn default_holiday_calendar_blocks_orders_and_receipts_on_christmas() {
    let holidays = HolidayCalendar::default();
    assert!(holidays.is_holiday(d(2026, 12, 25), None));
    let (blocks_orders, blocks_receipts) = holidays.effects_on(d(2026, 12, 25), None);
    assert!(blocks_orders);
    assert!(blocks_receipts);
}

#[test]
fn custom_single_date_rule_only_blocks_the_effect_it_names() {
    let holidays = HolidayCalendar {
        rules: vec![HolidayRule {
            name: "warehouse stocktake".to_string(),
            scope: "system".to_string(),
            effect: HolidayEffect::NoReceipt,
            rule_type: HolidayRuleType::Single { date: d(2026, 6, 15) },
        }],
    };

    let (blocks_orders, blocks_receipts) = holidays.effects_on(d(2026, 6, 15), None);
    assert!(!blocks_orders);
    assert!(blocks_receipts);
    assert!(!holidays.is_holiday(d(2026, 6, 16), None));
}

#[test]
fn fixed_day_of_every_month_rule_applies_across_years() {
    let holidays = HolidayCalendar {
        rules: vec![HolidayRule {
            name: "mid-month maintenance window".to_string(),
            scope: "system".to_string(),
            effect: HolidayEffect::Both,
            rule_type: HolidayRuleType::Fixed { month: None, day: 15 },
        }],
    };

    assert!(holidays.is_holiday(d(2026, 1, 15), None));
    assert!(holidays.is_holiday(d(2027, 9, 15), None));
    assert!(!holidays.is_holiday(d(2026, 1, 16), None));
}

#[test]
fn holiday_calendar_from_json_falls_back_to_default_when_file_is_missing() {
    let holidays = HolidayCalendar::from_json(std::path::Path::new("/nonexistent/holidays.json"));
    assert!(holidays.is_holiday(d(2026, 12, 25), None));
}
