use crate::domain::models::{
    AuditLogEntry, DemandVariability, EventKind, ForecastMethod, Lot, OrderLog, OrderStatus,
    PromoWindow, ReceivingLog, SalesRecord, Sku, Transaction, WastePenaltyMode,
};
use crate::error::{EngineError, EngineResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS skus (
    sku TEXT PRIMARY KEY,
    description TEXT NOT NULL DEFAULT '',
    ean TEXT,
    moq INTEGER NOT NULL DEFAULT 1,
    pack_size INTEGER NOT NULL DEFAULT 1,
    lead_time_days INTEGER NOT NULL DEFAULT 7,
    review_period_days INTEGER NOT NULL DEFAULT 7,
    safety_stock_override REAL,
    shelf_life_days INTEGER NOT NULL DEFAULT 0,
    min_residual_shelf_life_days INTEGER NOT NULL DEFAULT 0,
    reorder_point INTEGER,
    max_stock INTEGER NOT NULL DEFAULT 999,
    demand_variability TEXT NOT NULL DEFAULT 'STABLE',
    target_csl REAL NOT NULL DEFAULT 0.95,
    forecast_method TEXT NOT NULL DEFAULT 'simple',
    waste_penalty_mode TEXT NOT NULL DEFAULT 'none',
    waste_penalty_factor REAL NOT NULL DEFAULT 0.0,
    waste_risk_threshold REAL NOT NULL DEFAULT 0.0,
    waste_horizon_days INTEGER NOT NULL DEFAULT 0,
    in_assortment INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    event TEXT NOT NULL,
    qty INTEGER NOT NULL,
    receipt_date TEXT,
    note TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_transactions_sku_date ON transactions(sku, date);

CREATE TABLE IF NOT EXISTS sales (
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_sold INTEGER NOT NULL,
    promo_flag INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (date, sku)
);

CREATE TABLE IF NOT EXISTS lots (
    lot_id TEXT PRIMARY KEY,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    expiry_date TEXT,
    qty_on_hand INTEGER NOT NULL,
    receipt_id TEXT NOT NULL,
    receipt_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_logs (
    order_id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_ordered INTEGER NOT NULL,
    qty_received INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'PENDING',
    receipt_date TEXT NOT NULL,
    prebuild_metadata TEXT NOT NULL DEFAULT '',
    UNIQUE(order_id)
);

CREATE TABLE IF NOT EXISTS receiving_logs (
    document_id TEXT NOT NULL,
    receipt_id TEXT NOT NULL,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_received INTEGER NOT NULL,
    receipt_date TEXT NOT NULL,
    order_ids TEXT NOT NULL DEFAULT '',
    UNIQUE(document_id, sku)
);

CREATE TABLE IF NOT EXISTS promo_calendar (
    sku TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    store_id TEXT,
    promo_flag INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    operation TEXT NOT NULL,
    sku TEXT,
    details TEXT NOT NULL DEFAULT '',
    user TEXT,
    run_id TEXT
);
"#;

/// Embedded relational backend. Foreign keys are enforced, journaling mode
/// allows lock-free reads during writes, and writers retry on `SQLITE_BUSY`
/// with exponential backoff before surfacing a typed `BackendBusy` error.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

fn retry_busy<T>(mut op: impl FnMut() -> rusqlite::Result<T>) -> EngineResult<T> {
    const MAX_ATTEMPTS: u32 = 5;
    const BASE_MS: u64 = 10;
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy && attempt + 1 < MAX_ATTEMPTS =>
            {
                let backoff_ms = BASE_MS * 2u64.pow(attempt);
                let seed = (attempt as u64 + 1).wrapping_mul(2654435761);
                let jitter_frac = ((seed % 1000) as f64 / 1000.0) * 0.5 - 0.25;
                let jittered = (backoff_ms as f64 * (1.0 + jitter_frac)).max(0.0) as u64;
                sleep(Duration::from_millis(jittered));
                attempt += 1;
            }
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                return Err(EngineError::BackendBusy(
                    msg.unwrap_or_else(|| "database locked after retry exhaustion".to_string()),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// `PRAGMA integrity_check` + `PRAGMA foreign_key_check`, used by the
    /// `db_check` maintenance tool.
    pub fn integrity_check(&self) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut problems = Vec::new();
        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;
        if integrity != "ok" {
            problems.push(format!("integrity_check: {integrity}"));
        }
        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let table: String = row.get(0)?;
            problems.push(format!("foreign key violation in {table}"));
        }
        Ok(problems)
    }

    pub fn vacuum(&self) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("REINDEX; VACUUM;")?;
        Ok(())
    }
}

fn event_kind_str(k: EventKind) -> &'static str {
    match k {
        EventKind::Snapshot => "SNAPSHOT",
        EventKind::Order => "ORDER",
        EventKind::Receipt => "RECEIPT",
        EventKind::Sale => "SALE",
        EventKind::Waste => "WASTE",
        EventKind::Adjust => "ADJUST",
        EventKind::Unfulfilled => "UNFULFILLED",
        EventKind::AssortmentIn => "ASSORTMENT_IN",
        EventKind::AssortmentOut => "ASSORTMENT_OUT",
    }
}
fn event_kind_of(s: &str) -> EngineResult<EventKind> {
    Ok(match s {
        "SNAPSHOT" => EventKind::Snapshot,
        "ORDER" => EventKind::Order,
        "RECEIPT" => EventKind::Receipt,
        "SALE" => EventKind::Sale,
        "WASTE" => EventKind::Waste,
        "ADJUST" => EventKind::Adjust,
        "UNFULFILLED" => EventKind::Unfulfilled,
        "ASSORTMENT_IN" => EventKind::AssortmentIn,
        "ASSORTMENT_OUT" => EventKind::AssortmentOut,
        other => return Err(EngineError::InvalidInput(format!("unknown event kind: {other}"))),
    })
}
fn order_status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "PENDING",
        OrderStatus::Partial => "PARTIAL",
        OrderStatus::Received => "RECEIVED",
    }
}
fn order_status_of(s: &str) -> OrderStatus {
    match s {
        "PARTIAL" => OrderStatus::Partial,
        "RECEIVED" => OrderStatus::Received,
        _ => OrderStatus::Pending,
    }
}
fn demand_variability_str(v: DemandVariability) -> &'static str {
    match v {
        DemandVariability::Stable => "STABLE",
        DemandVariability::Variable => "VARIABLE",
        DemandVariability::Intermittent => "INTERMITTENT",
    }
}
fn demand_variability_of(s: &str) -> DemandVariability {
    match s {
        "VARIABLE" => DemandVariability::Variable,
        "INTERMITTENT" => DemandVariability::Intermittent,
        _ => DemandVariability::Stable,
    }
}
fn waste_penalty_mode_str(m: WastePenaltyMode) -> &'static str {
    match m {
        WastePenaltyMode::None => "none",
        WastePenaltyMode::Soft => "soft",
        WastePenaltyMode::Hard => "hard",
    }
}
fn waste_penalty_mode_of(s: &str) -> WastePenaltyMode {
    match s {
        "soft" => WastePenaltyMode::Soft,
        "hard" => WastePenaltyMode::Hard,
        _ => WastePenaltyMode::None,
    }
}
fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
fn parse_date(s: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| EngineError::InvalidInput(format!("bad date: {s}")))
}

impl super::Storage for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn read_skus(&self) -> EngineResult<Vec<Sku>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT sku, description, ean, moq, pack_size, lead_time_days, review_period_days, safety_stock_override, shelf_life_days, min_residual_shelf_life_days, reorder_point, max_stock, demand_variability, target_csl, forecast_method, waste_penalty_mode, waste_penalty_factor, waste_risk_threshold, waste_horizon_days, in_assortment FROM skus")?;
        let rows = stmt.query_map([], |row| {
            Ok(Sku {
                sku: row.get(0)?,
                description: row.get(1)?,
                ean: row.get(2)?,
                moq: row.get(3)?,
                pack_size: row.get(4)?,
                lead_time_days: row.get(5)?,
                review_period_days: row.get(6)?,
                safety_stock_override: row.get(7)?,
                shelf_life_days: row.get(8)?,
                min_residual_shelf_life_days: row.get(9)?,
                reorder_point: row.get(10)?,
                max_stock: row.get(11)?,
                demand_variability: demand_variability_of(&row.get::<_, String>(12)?),
                target_csl: row.get(13)?,
                forecast_method: {
                    let s: String = row.get(14)?;
                    match s.as_str() {
                        "monte_carlo" => ForecastMethod::MonteCarlo,
                        "croston" => ForecastMethod::Croston,
                        "sba" => ForecastMethod::Sba,
                        "tsb" => ForecastMethod::Tsb,
                        "intermittent_auto" => ForecastMethod::IntermittentAuto,
                        _ => ForecastMethod::Simple,
                    }
                },
                waste_penalty_mode: waste_penalty_mode_of(&row.get::<_, String>(15)?),
                waste_penalty_factor: row.get(16)?,
                waste_risk_threshold: row.get(17)?,
                waste_horizon_days: row.get(18)?,
                in_assortment: row.get::<_, i64>(19)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    fn write_sku(&self, sku: &Sku) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO skus (sku, description, ean, moq, pack_size, lead_time_days, review_period_days, safety_stock_override, shelf_life_days, min_residual_shelf_life_days, reorder_point, max_stock, demand_variability, target_csl, forecast_method, waste_penalty_mode, waste_penalty_factor, waste_risk_threshold, waste_horizon_days, in_assortment)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
                params![
                    sku.sku, sku.description, sku.ean, sku.moq, sku.pack_size, sku.lead_time_days,
                    sku.review_period_days, sku.safety_stock_override, sku.shelf_life_days,
                    sku.min_residual_shelf_life_days, sku.reorder_point, sku.max_stock,
                    demand_variability_str(sku.demand_variability), sku.target_csl,
                    sku.forecast_method.as_str(), waste_penalty_mode_str(sku.waste_penalty_mode),
                    sku.waste_penalty_factor, sku.waste_risk_threshold, sku.waste_horizon_days,
                    sku.in_assortment as i64,
                ],
            )
        })?;
        Ok(())
    }

    fn update_sku(&self, sku: &Sku) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = retry_busy(|| {
            conn.execute(
                "UPDATE skus SET description=?2, ean=?3, moq=?4, pack_size=?5, lead_time_days=?6,
                 review_period_days=?7, safety_stock_override=?8, shelf_life_days=?9,
                 min_residual_shelf_life_days=?10, reorder_point=?11, max_stock=?12,
                 demand_variability=?13, target_csl=?14, forecast_method=?15, waste_penalty_mode=?16,
                 waste_penalty_factor=?17, waste_risk_threshold=?18, waste_horizon_days=?19, in_assortment=?20
                 WHERE sku=?1",
                params![
                    sku.sku, sku.description, sku.ean, sku.moq, sku.pack_size, sku.lead_time_days,
                    sku.review_period_days, sku.safety_stock_override, sku.shelf_life_days,
                    sku.min_residual_shelf_life_days, sku.reorder_point, sku.max_stock,
                    demand_variability_str(sku.demand_variability), sku.target_csl,
                    sku.forecast_method.as_str(), waste_penalty_mode_str(sku.waste_penalty_mode),
                    sku.waste_penalty_factor, sku.waste_risk_threshold, sku.waste_horizon_days,
                    sku.in_assortment as i64,
                ],
            )
        })?;
        Ok(updated > 0)
    }

    fn delete_sku(&self, sku_id: &str) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = retry_busy(|| conn.execute("DELETE FROM skus WHERE sku=?1", params![sku_id]))?;
        Ok(deleted > 0)
    }

    fn read_transactions(&self) -> EngineResult<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT date, sku, event, qty, receipt_date, note FROM transactions ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let date_s: String = row.get(0)?;
            let receipt_s: Option<String> = row.get(4)?;
            Ok((date_s, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, i64>(3)?, receipt_s, row.get::<_, String>(5)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (date_s, sku, event_s, qty, receipt_s, note) = row?;
            out.push(Transaction {
                date: parse_date(&date_s)?,
                sku,
                event: event_kind_of(&event_s)?,
                qty,
                receipt_date: receipt_s.map(|s| parse_date(&s)).transpose()?,
                note,
            });
        }
        Ok(out)
    }

    fn append_transaction(&self, txn: &Transaction) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO transactions (date, sku, event, qty, receipt_date, note) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    date_str(txn.date),
                    txn.sku,
                    event_kind_str(txn.event),
                    txn.qty,
                    txn.receipt_date.map(date_str),
                    txn.note,
                ],
            )
        })?;
        Ok(())
    }

    fn append_transactions_batch(&self, txns: &[Transaction]) -> EngineResult<()> {
        let mut conn = self.conn.lock().unwrap();
        retry_busy(|| {
            let tx = conn.transaction()?;
            for txn in txns {
                tx.execute(
                    "INSERT INTO transactions (date, sku, event, qty, receipt_date, note) VALUES (?1,?2,?3,?4,?5,?6)",
                    params![
                        date_str(txn.date),
                        txn.sku,
                        event_kind_str(txn.event),
                        txn.qty,
                        txn.receipt_date.map(date_str),
                        txn.note,
                    ],
                )?;
            }
            tx.commit()
        })?;
        let _ = &mut conn;
        Ok(())
    }

    fn overwrite_transactions(&self, txns: &[Transaction]) -> EngineResult<()> {
        let mut conn = self.conn.lock().unwrap();
        retry_busy(|| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM transactions", [])?;
            for txn in txns {
                tx.execute(
                    "INSERT INTO transactions (date, sku, event, qty, receipt_date, note) VALUES (?1,?2,?3,?4,?5,?6)",
                    params![
                        date_str(txn.date),
                        txn.sku,
                        event_kind_str(txn.event),
                        txn.qty,
                        txn.receipt_date.map(date_str),
                        txn.note,
                    ],
                )?;
            }
            tx.commit()
        })?;
        let _ = &mut conn;
        Ok(())
    }

    fn read_sales(&self) -> EngineResult<Vec<SalesRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT date, sku, qty_sold, promo_flag FROM sales")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (date_s, sku, qty_sold, promo_flag) = row?;
            out.push(SalesRecord { date: parse_date(&date_s)?, sku, qty_sold, promo_flag: promo_flag != 0 });
        }
        Ok(out)
    }

    fn append_sales(&self, rec: &SalesRecord) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO sales (date, sku, qty_sold, promo_flag) VALUES (?1,?2,?3,?4)
                 ON CONFLICT(date, sku) DO UPDATE SET qty_sold=excluded.qty_sold, promo_flag=excluded.promo_flag",
                params![date_str(rec.date), rec.sku, rec.qty_sold, rec.promo_flag as i64],
            )
        })?;
        Ok(())
    }

    fn read_lots(&self) -> EngineResult<Vec<Lot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT lot_id, sku, expiry_date, qty_on_hand, receipt_id, receipt_date FROM lots")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (lot_id, sku, expiry_s, qty_on_hand, receipt_id, receipt_date_s) = row?;
            out.push(Lot {
                lot_id,
                sku,
                expiry_date: expiry_s.map(|s| parse_date(&s)).transpose()?,
                qty_on_hand,
                receipt_id,
                receipt_date: parse_date(&receipt_date_s)?,
            });
        }
        Ok(out)
    }

    fn write_lot(&self, lot: &Lot) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO lots (lot_id, sku, expiry_date, qty_on_hand, receipt_id, receipt_date) VALUES (?1,?2,?3,?4,?5,?6)
                 ON CONFLICT(lot_id) DO UPDATE SET qty_on_hand=excluded.qty_on_hand",
                params![lot.lot_id, lot.sku, lot.expiry_date.map(date_str), lot.qty_on_hand, lot.receipt_id, date_str(lot.receipt_date)],
            )
        })?;
        Ok(())
    }

    fn overwrite_lots(&self, lots: &[Lot]) -> EngineResult<()> {
        let mut conn = self.conn.lock().unwrap();
        retry_busy(|| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM lots", [])?;
            for lot in lots {
                tx.execute(
                    "INSERT INTO lots (lot_id, sku, expiry_date, qty_on_hand, receipt_id, receipt_date) VALUES (?1,?2,?3,?4,?5,?6)",
                    params![lot.lot_id, lot.sku, lot.expiry_date.map(date_str), lot.qty_on_hand, lot.receipt_id, date_str(lot.receipt_date)],
                )?;
            }
            tx.commit()
        })?;
        let _ = &mut conn;
        Ok(())
    }

    fn read_promo_calendar(&self) -> EngineResult<Vec<PromoWindow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT sku, start_date, end_date, store_id, promo_flag FROM promo_calendar ORDER BY start_date")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (sku, start_s, end_s, store_id, promo_flag) = row?;
            out.push(PromoWindow {
                sku,
                start_date: parse_date(&start_s)?,
                end_date: parse_date(&end_s)?,
                store_id,
                promo_flag: promo_flag != 0,
            });
        }
        Ok(out)
    }

    fn write_promo_window(&self, window: &PromoWindow) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO promo_calendar (sku, start_date, end_date, store_id, promo_flag) VALUES (?1,?2,?3,?4,?5)",
                params![window.sku, date_str(window.start_date), date_str(window.end_date), window.store_id, window.promo_flag as i64],
            )
        })?;
        Ok(())
    }

    fn read_order_logs(&self) -> EngineResult<Vec<OrderLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT order_id, date, sku, qty_ordered, qty_received, status, receipt_date, prebuild_metadata FROM order_logs")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (order_id, date_s, sku, qty_ordered, qty_received, status_s, receipt_s, prebuild_metadata) = row?;
            out.push(OrderLog {
                order_id,
                date: parse_date(&date_s)?,
                sku,
                qty_ordered,
                qty_received,
                status: order_status_of(&status_s),
                receipt_date: parse_date(&receipt_s)?,
                prebuild_metadata,
            });
        }
        Ok(out)
    }

    fn write_order_log(&self, log: &OrderLog) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO order_logs (order_id, date, sku, qty_ordered, qty_received, status, receipt_date, prebuild_metadata) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![log.order_id, date_str(log.date), log.sku, log.qty_ordered, log.qty_received, order_status_str(log.status), date_str(log.receipt_date), log.prebuild_metadata],
            )
        })?;
        Ok(())
    }

    fn update_order_received_qty(&self, order_id: &str, qty_received: i64, status: OrderStatus) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = retry_busy(|| {
            conn.execute(
                "UPDATE order_logs SET qty_received=?2, status=?3 WHERE order_id=?1",
                params![order_id, qty_received, order_status_str(status)],
            )
        })?;
        Ok(updated > 0)
    }

    fn read_receiving_logs(&self) -> EngineResult<Vec<ReceivingLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT document_id, receipt_id, date, sku, qty_received, receipt_date, order_ids FROM receiving_logs")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (document_id, receipt_id, date_s, sku, qty_received, receipt_s, order_ids) = row?;
            out.push(ReceivingLog {
                document_id,
                receipt_id,
                date: parse_date(&date_s)?,
                sku,
                qty_received,
                receipt_date: parse_date(&receipt_s)?,
                order_ids,
            });
        }
        Ok(out)
    }

    fn receiving_document_exists(&self, document_id: &str) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM receiving_logs WHERE document_id=?1 OR receipt_id=?1 LIMIT 1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn write_receiving_log(&self, log: &ReceivingLog) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO receiving_logs (document_id, receipt_id, date, sku, qty_received, receipt_date, order_ids) VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![log.document_id, log.receipt_id, date_str(log.date), log.sku, log.qty_received, date_str(log.receipt_date), log.order_ids],
            )
        })?;
        Ok(())
    }

    fn append_audit_log(&self, entry: &AuditLogEntry) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        retry_busy(|| {
            conn.execute(
                "INSERT INTO audit_log (timestamp, operation, sku, details, user, run_id) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                    entry.operation,
                    entry.sku,
                    entry.details,
                    entry.user,
                    entry.run_id,
                ],
            )
        })?;
        Ok(())
    }

    fn read_audit_log(&self, sku: Option<&str>, limit: Option<usize>) -> EngineResult<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let limit_sql = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(
            "SELECT timestamp, operation, sku, details, user, run_id FROM audit_log
             WHERE (?1 IS NULL OR sku = ?1) ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![sku, limit_sql], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (ts_s, operation, sku, details, user, run_id) = row?;
            let timestamp = chrono::NaiveDateTime::parse_from_str(&ts_s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now());
            out.push(AuditLogEntry { timestamp, operation, sku, details, user, run_id });
        }
        Ok(out)
    }
}
