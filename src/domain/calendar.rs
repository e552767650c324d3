use crate::error::{EngineError, EngineResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a holiday rule blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayEffect {
    NoOrder,
    NoReceipt,
    Both,
}

impl HolidayEffect {
    fn blocks_orders(&self) -> bool {
        matches!(self, HolidayEffect::NoOrder | HolidayEffect::Both)
    }

    fn blocks_receipts(&self) -> bool {
        matches!(self, HolidayEffect::NoReceipt | HolidayEffect::Both)
    }
}

/// Rule-specific match parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HolidayRuleType {
    Single { date: NaiveDate },
    Range { start: NaiveDate, end: NaiveDate },
    /// `month: None` means a monthly recurrence (day of every month).
    Fixed { month: Option<u32>, day: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub scope: String,
    pub effect: HolidayEffect,
    pub rule_type: HolidayRuleType,
}

impl HolidayRule {
    pub fn applies_to_date(&self, check_date: NaiveDate) -> bool {
        match &self.rule_type {
            HolidayRuleType::Single { date } => check_date == *date,
            HolidayRuleType::Range { start, end } => *start <= check_date && check_date <= *end,
            HolidayRuleType::Fixed { month: None, day } => check_date.day() == *day,
            HolidayRuleType::Fixed {
                month: Some(month),
                day,
            } => check_date.month() == *month && check_date.day() == *day,
        }
    }
}

/// Easter Sunday via the Meeus/Jones/Butcher (Gregorian) algorithm.
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("Meeus/Jones/Butcher always yields a valid date")
}

fn fixed(name: &str, month: u32, day: u32) -> HolidayRule {
    HolidayRule {
        name: name.to_string(),
        scope: "system".to_string(),
        effect: HolidayEffect::Both,
        rule_type: HolidayRuleType::Fixed {
            month: Some(month),
            day,
        },
    }
}

/// Built-in Italian public holidays, excluding the mobile Easter dates
/// (those are computed dynamically, not stored as rules).
fn italian_system_rules() -> Vec<HolidayRule> {
    vec![
        fixed("Capodanno", 1, 1),
        fixed("Epifania", 1, 6),
        fixed("Liberazione", 4, 25),
        fixed("Festa del Lavoro", 5, 1),
        fixed("Festa della Repubblica", 6, 2),
        fixed("Ferragosto", 8, 15),
        fixed("Ognissanti", 11, 1),
        fixed("Immacolata Concezione", 12, 8),
        fixed("Natale", 12, 25),
        fixed("Santo Stefano", 12, 26),
    ]
}

/// Unified holiday/closure calendar: Italian public holidays always load,
/// config rules are additive.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    pub rules: Vec<HolidayRule>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self {
            rules: italian_system_rules(),
        }
    }
}

impl HolidayCalendar {
    /// Loads custom rules from JSON, falling back silently (warning only)
    /// to Italian public holidays when the file is missing or malformed.
    pub fn from_json(path: &Path) -> Self {
        let mut rules = Vec::new();

        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<Vec<HolidayRule>>(&contents) {
                    Ok(parsed) => rules = parsed,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "could not parse holiday config; falling back to Italian public holidays only");
                    }
                },
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not read holiday config; falling back to Italian public holidays only");
                }
            }
        }

        rules.extend(italian_system_rules());
        Self { rules }
    }

    fn is_easter_related(&self, check_date: NaiveDate) -> bool {
        let easter = easter_sunday(check_date.year());
        check_date == easter || check_date == easter + Duration::days(1)
    }

    pub fn effects_on(&self, check_date: NaiveDate, scope: Option<&str>) -> (bool, bool) {
        let mut no_order = false;
        let mut no_receipt = false;

        if self.is_easter_related(check_date) && (scope.is_none() || scope == Some("system")) {
            no_order = true;
            no_receipt = true;
        }

        for rule in &self.rules {
            if !rule.applies_to_date(check_date) {
                continue;
            }
            if let Some(s) = scope {
                if rule.scope != s {
                    continue;
                }
            }
            if rule.effect.blocks_orders() {
                no_order = true;
            }
            if rule.effect.blocks_receipts() {
                no_receipt = true;
            }
        }

        (no_order, no_receipt)
    }

    pub fn is_holiday(&self, check_date: NaiveDate, scope: Option<&str>) -> bool {
        let (no_order, no_receipt) = self.effects_on(check_date, scope);
        no_order || no_receipt
    }

    pub fn list_holidays(&self, year: i32, scope: Option<&str>) -> Vec<NaiveDate> {
        let mut dates: std::collections::BTreeSet<NaiveDate> = std::collections::BTreeSet::new();

        if scope.is_none() || scope == Some("system") {
            let easter = easter_sunday(year);
            dates.insert(easter);
            dates.insert(easter + Duration::days(1));
        }

        for rule in &self.rules {
            if let Some(s) = scope {
                if rule.scope != s {
                    continue;
                }
            }
            match &rule.rule_type {
                HolidayRuleType::Single { date } => {
                    if date.year() == year {
                        dates.insert(*date);
                    }
                }
                HolidayRuleType::Range { start, end } => {
                    let mut cur = *start;
                    while cur <= *end {
                        if cur.year() == year {
                            dates.insert(cur);
                        }
                        cur += Duration::days(1);
                    }
                }
                HolidayRuleType::Fixed {
                    month: Some(month),
                    day,
                } => {
                    if let Some(d) = NaiveDate::from_ymd_opt(year, *month, *day) {
                        dates.insert(d);
                    }
                }
                HolidayRuleType::Fixed { month: None, .. } => {
                    // Monthly recurrence isn't a single calendar-year listing concern.
                }
            }
        }

        dates.into_iter().collect()
    }
}

/// Friday-only dual-lane delivery channel (glossary: Lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Standard,
    Saturday,
    Monday,
}

fn weekday_index(d: NaiveDate) -> u8 {
    // Mon=0.
    d.weekday().num_days_from_monday() as u8
}

/// Order/delivery day rules.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub order_days: Vec<u8>,
    pub delivery_days: Vec<u8>,
    pub lead_time_days: i64,
    pub holidays: HolidayCalendar,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            order_days: vec![0, 1, 2, 3, 4],
            delivery_days: vec![0, 1, 2, 3, 4, 5],
            lead_time_days: 1,
            holidays: HolidayCalendar::default(),
        }
    }
}

impl CalendarConfig {
    pub fn is_order_day(&self, d: NaiveDate) -> bool {
        let (no_order, _) = self.holidays.effects_on(d, None);
        self.order_days.contains(&weekday_index(d)) && !no_order
    }

    pub fn is_delivery_day(&self, d: NaiveDate) -> bool {
        let (_, no_receipt) = self.holidays.effects_on(d, None);
        self.delivery_days.contains(&weekday_index(d)) && !no_receipt
    }

    pub fn next_delivery_day(&self, d: NaiveDate) -> EngineResult<NaiveDate> {
        let mut cur = d;
        for _ in 0..14 {
            if self.is_delivery_day(cur) {
                return Ok(cur);
            }
            cur += Duration::days(1);
        }
        Err(EngineError::NoDeliveryWindow(d))
    }

    pub fn next_order_opportunity(&self, d: NaiveDate) -> NaiveDate {
        let mut cur = d + Duration::days(1);
        loop {
            if self.is_order_day(cur) {
                return cur;
            }
            cur += Duration::days(1);
        }
    }

    pub fn next_receipt_date(&self, order_date: NaiveDate, lane: Lane) -> EngineResult<NaiveDate> {
        if !self.is_order_day(order_date) {
            return Err(EngineError::NotAnOrderDay(order_date));
        }

        match lane {
            Lane::Standard => {
                self.next_delivery_day(order_date + Duration::days(self.lead_time_days))
            }
            Lane::Saturday => {
                if order_date.weekday() != Weekday::Fri {
                    return Err(EngineError::InvalidInput(
                        "SATURDAY lane is only valid for Friday order dates".to_string(),
                    ));
                }
                Ok(order_date + Duration::days(1))
            }
            Lane::Monday => {
                if order_date.weekday() != Weekday::Fri {
                    return Err(EngineError::InvalidInput(
                        "MONDAY lane is only valid for Friday order dates".to_string(),
                    ));
                }
                Ok(order_date + Duration::days(3))
            }
        }
    }

    /// `(r1, r2, P)`: r1 = receipt of this order, r2 = receipt of the next
    /// ordered shipment, P = days between them (never negative).
    pub fn protection_window(
        &self,
        order_date: NaiveDate,
        lane: Lane,
    ) -> EngineResult<(NaiveDate, NaiveDate, i64)> {
        let r1 = self.next_receipt_date(order_date, lane)?;
        let next_order = self.next_order_opportunity(order_date);
        let r2 = self.next_receipt_date(next_order, Lane::Standard)?;
        let p = (r2 - r1).num_days().max(0);
        Ok((r1, r2, p))
    }

    /// Both Friday dual-lane protection windows, (SATURDAY, MONDAY).
    pub fn get_friday_lanes(
        &self,
        friday: NaiveDate,
    ) -> EngineResult<((NaiveDate, NaiveDate, i64), (NaiveDate, NaiveDate, i64))> {
        let sat = self.protection_window(friday, Lane::Saturday)?;
        let mon = self.protection_window(friday, Lane::Monday)?;
        Ok((sat, mon))
    }
}
