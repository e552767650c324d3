use crate::domain::models::{
    AuditLogEntry, DemandVariability, EventKind, ForecastMethod, Lot, OrderLog, OrderStatus,
    PromoWindow, ReceivingLog, SalesRecord, Sku, Transaction, WastePenaltyMode,
};
use crate::error::{EngineError, EngineResult};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One record-oriented CSV file per entity, header schema fixed, missing
/// trailing columns default to the neutral value of their type and unknown
/// extra columns are ignored — tolerates forward/backward schema drift.
const SKUS_HEADER: &[&str] = &[
    "sku",
    "description",
    "ean",
    "moq",
    "pack_size",
    "lead_time_days",
    "review_period_days",
    "safety_stock_override",
    "shelf_life_days",
    "min_residual_shelf_life_days",
    "reorder_point",
    "max_stock",
    "demand_variability",
    "target_csl",
    "forecast_method",
    "waste_penalty_mode",
    "waste_penalty_factor",
    "waste_risk_threshold",
    "waste_horizon_days",
    "in_assortment",
];
const TRANSACTIONS_HEADER: &[&str] = &["date", "sku", "event", "qty", "receipt_date", "note"];
const SALES_HEADER: &[&str] = &["date", "sku", "qty_sold", "promo_flag"];
const LOTS_HEADER: &[&str] = &["lot_id", "sku", "expiry_date", "qty_on_hand", "receipt_id", "receipt_date"];
const ORDER_LOGS_HEADER: &[&str] = &[
    "order_id",
    "date",
    "sku",
    "qty_ordered",
    "qty_received",
    "status",
    "receipt_date",
    "prebuild_metadata",
];
const RECEIVING_LOGS_HEADER: &[&str] = &[
    "document_id",
    "receipt_id",
    "date",
    "sku",
    "qty_received",
    "receipt_date",
    "order_ids",
];
const AUDIT_LOG_HEADER: &[&str] = &["timestamp", "operation", "sku", "details", "user", "run_id"];
const PROMO_CALENDAR_HEADER: &[&str] = &["sku", "start_date", "end_date", "store_id", "promo_flag"];

/// A parsed CSV row with header-name lookup, tolerant of missing columns.
struct Row<'a> {
    header: &'a [&'a str],
    values: Vec<String>,
}

impl<'a> Row<'a> {
    fn get(&self, column: &str) -> &str {
        self.header
            .iter()
            .position(|h| *h == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn read_rows<'a>(path: &Path, header: &'a [&'a str]) -> EngineResult<Vec<Row<'a>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        out.push(Row {
            header,
            values: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(out)
}

fn write_record<W: std::io::Write>(wtr: &mut csv::Writer<W>, fields: &[String]) -> EngineResult<()> {
    wtr.write_record(fields)?;
    Ok(())
}

/// CSV-based flat-file backend with auto-create, atomic batch writes, and
/// timestamped backups.
pub struct FlatFileStorage {
    data_dir: PathBuf,
    max_backups: usize,
    write_guard: Mutex<()>,
}

impl FlatFileStorage {
    pub fn new(data_dir: impl Into<PathBuf>, max_backups: usize) -> EngineResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let storage = Self {
            data_dir,
            max_backups: max_backups.max(2),
            write_guard: Mutex::new(()),
        };
        storage.ensure_file(SKUS_FILE, SKUS_HEADER)?;
        storage.ensure_file(TRANSACTIONS_FILE, TRANSACTIONS_HEADER)?;
        storage.ensure_file(SALES_FILE, SALES_HEADER)?;
        storage.ensure_file(LOTS_FILE, LOTS_HEADER)?;
        storage.ensure_file(ORDER_LOGS_FILE, ORDER_LOGS_HEADER)?;
        storage.ensure_file(RECEIVING_LOGS_FILE, RECEIVING_LOGS_HEADER)?;
        storage.ensure_file(AUDIT_LOG_FILE, AUDIT_LOG_HEADER)?;
        storage.ensure_file(PROMO_CALENDAR_FILE, PROMO_CALENDAR_HEADER)?;
        Ok(storage)
    }

    fn path(&self, filename: &str) -> PathBuf {
        self.data_dir.join(filename)
    }

    fn ensure_file(&self, filename: &str, header: &[&str]) -> EngineResult<()> {
        let path = self.path(filename);
        if !path.exists() {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(header)?;
            wtr.flush()?;
        }
        Ok(())
    }

    fn backup_file(&self, filename: &str) -> EngineResult<()> {
        let path = self.path(filename);
        if !path.exists() {
            return Ok(());
        }
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self.path(&format!("{filename}.backup.{timestamp}"));
        if let Err(e) = std::fs::copy(&path, &backup_path) {
            tracing::warn!(filename, error = %e, "backup failed, continuing without it");
            return Ok(());
        }
        self.prune_backups(filename)
    }

    fn prune_backups(&self, filename: &str) -> EngineResult<()> {
        let prefix = format!("{filename}.backup.");
        let mut backups: Vec<PathBuf> = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
            })
            .collect();
        backups.sort();
        if backups.len() > self.max_backups {
            for old in &backups[..backups.len() - self.max_backups] {
                let _ = std::fs::remove_file(old);
            }
        }
        Ok(())
    }

    /// Serialize `rows` to a temp file in `data_dir`, then atomically rename
    /// over the target, backing up the prior contents first.
    fn write_atomic(&self, filename: &str, header: &[&str], rows: &[Vec<String>]) -> EngineResult<()> {
        let _guard = self.write_guard.lock().unwrap();
        self.backup_file(filename)?;
        let tmp_path = self.path(&format!("{filename}.tmp"));
        {
            let mut wtr = csv::Writer::from_path(&tmp_path)?;
            wtr.write_record(header)?;
            for row in rows {
                write_record(&mut wtr, row)?;
            }
            wtr.flush()?;
        }
        std::fs::rename(&tmp_path, self.path(filename))?;
        Ok(())
    }

    /// Append a single row without rotating a backup.
    fn append_row(&self, filename: &str, row: &[String]) -> EngineResult<()> {
        let _guard = self.write_guard.lock().unwrap();
        let path = self.path(filename);
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(std::fs::OpenOptions::new().append(true).open(&path)?);
        write_record(&mut wtr, row)?;
        wtr.flush()?;
        Ok(())
    }
}

const SKUS_FILE: &str = "skus.csv";
const TRANSACTIONS_FILE: &str = "transactions.csv";
const SALES_FILE: &str = "sales.csv";
const LOTS_FILE: &str = "lots.csv";
const ORDER_LOGS_FILE: &str = "order_logs.csv";
const RECEIVING_LOGS_FILE: &str = "receiving_logs.csv";
const AUDIT_LOG_FILE: &str = "audit_log.csv";
const PROMO_CALENDAR_FILE: &str = "promo_calendar.csv";

fn parse_i64(s: &str, default: i64) -> i64 {
    s.trim().parse().unwrap_or(default)
}
fn parse_f64(s: &str, default: f64) -> f64 {
    s.trim().parse().unwrap_or(default)
}
fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "" => default,
        "true" | "1" | "yes" | "t" => true,
        _ => false,
    }
}
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
fn opt_string(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn demand_variability_of(s: &str) -> DemandVariability {
    match s.trim().to_uppercase().as_str() {
        "VARIABLE" => DemandVariability::Variable,
        "INTERMITTENT" => DemandVariability::Intermittent,
        _ => DemandVariability::Stable,
    }
}
fn waste_penalty_mode_of(s: &str) -> WastePenaltyMode {
    match s.trim().to_lowercase().as_str() {
        "soft" => WastePenaltyMode::Soft,
        "hard" => WastePenaltyMode::Hard,
        _ => WastePenaltyMode::None,
    }
}
fn forecast_method_of(s: &str) -> ForecastMethod {
    match s.trim().to_lowercase().as_str() {
        "monte_carlo" => ForecastMethod::MonteCarlo,
        "croston" => ForecastMethod::Croston,
        "sba" => ForecastMethod::Sba,
        "tsb" => ForecastMethod::Tsb,
        "intermittent_auto" => ForecastMethod::IntermittentAuto,
        _ => ForecastMethod::Simple,
    }
}
fn event_kind_of(s: &str) -> EngineResult<EventKind> {
    Ok(match s.trim().to_uppercase().as_str() {
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
fn order_status_of(s: &str) -> OrderStatus {
    match s.trim().to_uppercase().as_str() {
        "PARTIAL" => OrderStatus::Partial,
        "RECEIVED" => OrderStatus::Received,
        _ => OrderStatus::Pending,
    }
}
fn order_status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "PENDING",
        OrderStatus::Partial => "PARTIAL",
        OrderStatus::Received => "RECEIVED",
    }
}

fn sku_from_row(row: &Row) -> Sku {
    Sku {
        sku: row.get("sku").trim().to_string(),
        description: row.get("description").trim().to_string(),
        ean: opt_string(row.get("ean")),
        moq: parse_i64(row.get("moq"), 1),
        pack_size: parse_i64(row.get("pack_size"), 1),
        lead_time_days: parse_i64(row.get("lead_time_days"), 7),
        review_period_days: parse_i64(row.get("review_period_days"), 7),
        safety_stock_override: opt_string(row.get("safety_stock_override")).and_then(|s| s.parse().ok()),
        shelf_life_days: parse_i64(row.get("shelf_life_days"), 0),
        min_residual_shelf_life_days: parse_i64(row.get("min_residual_shelf_life_days"), 0),
        reorder_point: opt_string(row.get("reorder_point")).and_then(|s| s.parse().ok()),
        max_stock: parse_i64(row.get("max_stock"), 999),
        demand_variability: demand_variability_of(row.get("demand_variability")),
        target_csl: parse_f64(row.get("target_csl"), 0.95),
        forecast_method: forecast_method_of(row.get("forecast_method")),
        waste_penalty_mode: waste_penalty_mode_of(row.get("waste_penalty_mode")),
        waste_penalty_factor: parse_f64(row.get("waste_penalty_factor"), 0.0),
        waste_risk_threshold: parse_f64(row.get("waste_risk_threshold"), 0.0),
        waste_horizon_days: parse_i64(row.get("waste_horizon_days"), 0),
        in_assortment: parse_bool(row.get("in_assortment"), true),
    }
}

fn sku_to_fields(sku: &Sku) -> Vec<String> {
    vec![
        sku.sku.clone(),
        sku.description.clone(),
        sku.ean.clone().unwrap_or_default(),
        sku.moq.to_string(),
        sku.pack_size.to_string(),
        sku.lead_time_days.to_string(),
        sku.review_period_days.to_string(),
        sku.safety_stock_override.map(|v| v.to_string()).unwrap_or_default(),
        sku.shelf_life_days.to_string(),
        sku.min_residual_shelf_life_days.to_string(),
        sku.reorder_point.map(|v| v.to_string()).unwrap_or_default(),
        sku.max_stock.to_string(),
        format!("{:?}", sku.demand_variability).to_uppercase(),
        sku.target_csl.to_string(),
        sku.forecast_method.as_str().to_string(),
        format!("{:?}", sku.waste_penalty_mode).to_lowercase(),
        sku.waste_penalty_factor.to_string(),
        sku.waste_risk_threshold.to_string(),
        sku.waste_horizon_days.to_string(),
        sku.in_assortment.to_string(),
    ]
}

fn txn_from_row(row: &Row) -> EngineResult<Transaction> {
    Ok(Transaction {
        date: parse_date(row.get("date")).ok_or_else(|| EngineError::InvalidInput("bad date".into()))?,
        sku: row.get("sku").trim().to_string(),
        event: event_kind_of(row.get("event"))?,
        qty: parse_i64(row.get("qty"), 0),
        receipt_date: parse_date(row.get("receipt_date")),
        note: row.get("note").to_string(),
    })
}

fn txn_to_fields(txn: &Transaction) -> Vec<String> {
    vec![
        txn.date.format("%Y-%m-%d").to_string(),
        txn.sku.clone(),
        event_kind_str(txn.event).to_string(),
        txn.qty.to_string(),
        txn.receipt_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        txn.note.clone(),
    ]
}

impl super::Storage for FlatFileStorage {
    fn backend_name(&self) -> &'static str {
        "flatfile"
    }

    fn read_skus(&self) -> EngineResult<Vec<Sku>> {
        let rows = read_rows(&self.path(SKUS_FILE), SKUS_HEADER)?;
        Ok(rows.iter().map(sku_from_row).collect())
    }

    fn write_sku(&self, sku: &Sku) -> EngineResult<()> {
        let mut rows: Vec<Vec<String>> = read_rows(&self.path(SKUS_FILE), SKUS_HEADER)?
            .iter()
            .map(|r| r.values.clone())
            .collect();
        rows.push(sku_to_fields(sku));
        self.write_atomic(SKUS_FILE, SKUS_HEADER, &rows)
    }

    fn update_sku(&self, sku: &Sku) -> EngineResult<bool> {
        let rows = read_rows(&self.path(SKUS_FILE), SKUS_HEADER)?;
        let mut found = false;
        let mut out: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.get("sku") == sku.sku {
                found = true;
                out.push(sku_to_fields(sku));
            } else {
                out.push(row.values.clone());
            }
        }
        if !found {
            return Ok(false);
        }
        self.write_atomic(SKUS_FILE, SKUS_HEADER, &out)?;
        Ok(true)
    }

    fn delete_sku(&self, sku_id: &str) -> EngineResult<bool> {
        let rows = read_rows(&self.path(SKUS_FILE), SKUS_HEADER)?;
        let before = rows.len();
        let out: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|r| r.get("sku") != sku_id)
            .map(|r| r.values)
            .collect();
        if out.len() == before {
            return Ok(false);
        }
        self.write_atomic(SKUS_FILE, SKUS_HEADER, &out)?;
        Ok(true)
    }

    fn read_transactions(&self) -> EngineResult<Vec<Transaction>> {
        read_rows(&self.path(TRANSACTIONS_FILE), TRANSACTIONS_HEADER)?
            .iter()
            .map(txn_from_row)
            .collect()
    }

    fn append_transaction(&self, txn: &Transaction) -> EngineResult<()> {
        self.append_row(TRANSACTIONS_FILE, &txn_to_fields(txn))
    }

    fn append_transactions_batch(&self, txns: &[Transaction]) -> EngineResult<()> {
        let mut rows: Vec<Vec<String>> = read_rows(&self.path(TRANSACTIONS_FILE), TRANSACTIONS_HEADER)?
            .iter()
            .map(|r| r.values.clone())
            .collect();
        rows.extend(txns.iter().map(txn_to_fields));
        self.write_atomic(TRANSACTIONS_FILE, TRANSACTIONS_HEADER, &rows)
    }

    fn overwrite_transactions(&self, txns: &[Transaction]) -> EngineResult<()> {
        let rows: Vec<Vec<String>> = txns.iter().map(txn_to_fields).collect();
        self.write_atomic(TRANSACTIONS_FILE, TRANSACTIONS_HEADER, &rows)
    }

    fn read_sales(&self) -> EngineResult<Vec<SalesRecord>> {
        let rows = read_rows(&self.path(SALES_FILE), SALES_HEADER)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(SalesRecord {
                    date: parse_date(row.get("date"))?,
                    sku: row.get("sku").trim().to_string(),
                    qty_sold: parse_i64(row.get("qty_sold"), 0),
                    promo_flag: parse_bool(row.get("promo_flag"), false),
                })
            })
            .collect())
    }

    fn append_sales(&self, rec: &SalesRecord) -> EngineResult<()> {
        self.append_row(
            SALES_FILE,
            &vec![
                rec.date.format("%Y-%m-%d").to_string(),
                rec.sku.clone(),
                rec.qty_sold.to_string(),
                rec.promo_flag.to_string(),
            ],
        )
    }

    fn read_lots(&self) -> EngineResult<Vec<Lot>> {
        let rows = read_rows(&self.path(LOTS_FILE), LOTS_HEADER)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Lot {
                    lot_id: row.get("lot_id").trim().to_string(),
                    sku: row.get("sku").trim().to_string(),
                    expiry_date: parse_date(row.get("expiry_date")),
                    qty_on_hand: parse_i64(row.get("qty_on_hand"), 0),
                    receipt_id: row.get("receipt_id").trim().to_string(),
                    receipt_date: parse_date(row.get("receipt_date"))?,
                })
            })
            .collect())
    }

    fn write_lot(&self, lot: &Lot) -> EngineResult<()> {
        self.append_row(
            LOTS_FILE,
            &vec![
                lot.lot_id.clone(),
                lot.sku.clone(),
                lot.expiry_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
                lot.qty_on_hand.to_string(),
                lot.receipt_id.clone(),
                lot.receipt_date.format("%Y-%m-%d").to_string(),
            ],
        )
    }

    fn overwrite_lots(&self, lots: &[Lot]) -> EngineResult<()> {
        let rows: Vec<Vec<String>> = lots
            .iter()
            .map(|lot| {
                vec![
                    lot.lot_id.clone(),
                    lot.sku.clone(),
                    lot.expiry_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
                    lot.qty_on_hand.to_string(),
                    lot.receipt_id.clone(),
                    lot.receipt_date.format("%Y-%m-%d").to_string(),
                ]
            })
            .collect();
        self.write_atomic(LOTS_FILE, LOTS_HEADER, &rows)
    }

    fn read_promo_calendar(&self) -> EngineResult<Vec<PromoWindow>> {
        let mut windows: Vec<PromoWindow> = read_rows(&self.path(PROMO_CALENDAR_FILE), PROMO_CALENDAR_HEADER)?
            .iter()
            .filter_map(|row| {
                Some(PromoWindow {
                    sku: row.get("sku").trim().to_string(),
                    start_date: parse_date(row.get("start_date"))?,
                    end_date: parse_date(row.get("end_date"))?,
                    store_id: opt_string(row.get("store_id")),
                    promo_flag: parse_bool(row.get("promo_flag"), true),
                })
            })
            .collect();
        windows.sort_by_key(|w| w.start_date);
        Ok(windows)
    }

    fn write_promo_window(&self, window: &PromoWindow) -> EngineResult<()> {
        self.append_row(
            PROMO_CALENDAR_FILE,
            &vec![
                window.sku.clone(),
                window.start_date.format("%Y-%m-%d").to_string(),
                window.end_date.format("%Y-%m-%d").to_string(),
                window.store_id.clone().unwrap_or_default(),
                window.promo_flag.to_string(),
            ],
        )
    }

    fn read_order_logs(&self) -> EngineResult<Vec<OrderLog>> {
        let rows = read_rows(&self.path(ORDER_LOGS_FILE), ORDER_LOGS_HEADER)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(OrderLog {
                    order_id: row.get("order_id").trim().to_string(),
                    date: parse_date(row.get("date"))?,
                    sku: row.get("sku").trim().to_string(),
                    qty_ordered: parse_i64(row.get("qty_ordered"), 0),
                    qty_received: parse_i64(row.get("qty_received"), 0),
                    status: order_status_of(row.get("status")),
                    receipt_date: parse_date(row.get("receipt_date"))?,
                    prebuild_metadata: row.get("prebuild_metadata").to_string(),
                })
            })
            .collect())
    }

    fn write_order_log(&self, log: &OrderLog) -> EngineResult<()> {
        self.append_row(
            ORDER_LOGS_FILE,
            &vec![
                log.order_id.clone(),
                log.date.format("%Y-%m-%d").to_string(),
                log.sku.clone(),
                log.qty_ordered.to_string(),
                log.qty_received.to_string(),
                order_status_str(log.status).to_string(),
                log.receipt_date.format("%Y-%m-%d").to_string(),
                log.prebuild_metadata.clone(),
            ],
        )
    }

    fn update_order_received_qty(
        &self,
        order_id: &str,
        qty_received: i64,
        status: OrderStatus,
    ) -> EngineResult<bool> {
        let rows = read_rows(&self.path(ORDER_LOGS_FILE), ORDER_LOGS_HEADER)?;
        let mut found = false;
        let mut out: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = row.values.clone();
            if row.get("order_id") == order_id {
                found = true;
                let qty_idx = ORDER_LOGS_HEADER.iter().position(|h| *h == "qty_received").unwrap();
                let status_idx = ORDER_LOGS_HEADER.iter().position(|h| *h == "status").unwrap();
                values[qty_idx] = qty_received.to_string();
                values[status_idx] = order_status_str(status).to_string();
            }
            out.push(values);
        }
        if !found {
            return Ok(false);
        }
        self.write_atomic(ORDER_LOGS_FILE, ORDER_LOGS_HEADER, &out)?;
        Ok(true)
    }

    fn read_receiving_logs(&self) -> EngineResult<Vec<ReceivingLog>> {
        let rows = read_rows(&self.path(RECEIVING_LOGS_FILE), RECEIVING_LOGS_HEADER)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ReceivingLog {
                    document_id: row.get("document_id").trim().to_string(),
                    receipt_id: row.get("receipt_id").trim().to_string(),
                    date: parse_date(row.get("date"))?,
                    sku: row.get("sku").trim().to_string(),
                    qty_received: parse_i64(row.get("qty_received"), 0),
                    receipt_date: parse_date(row.get("receipt_date"))?,
                    order_ids: row.get("order_ids").to_string(),
                })
            })
            .collect())
    }

    fn receiving_document_exists(&self, document_id: &str) -> EngineResult<bool> {
        let rows = read_rows(&self.path(RECEIVING_LOGS_FILE), RECEIVING_LOGS_HEADER)?;
        Ok(rows
            .iter()
            .any(|row| row.get("document_id") == document_id || row.get("receipt_id") == document_id))
    }

    fn write_receiving_log(&self, log: &ReceivingLog) -> EngineResult<()> {
        self.append_row(
            RECEIVING_LOGS_FILE,
            &vec![
                log.document_id.clone(),
                log.receipt_id.clone(),
                log.date.format("%Y-%m-%d").to_string(),
                log.sku.clone(),
                log.qty_received.to_string(),
                log.receipt_date.format("%Y-%m-%d").to_string(),
                log.order_ids.clone(),
            ],
        )
    }

    fn append_audit_log(&self, entry: &AuditLogEntry) -> EngineResult<()> {
        self.append_row(
            AUDIT_LOG_FILE,
            &vec![
                entry.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                entry.operation.clone(),
                entry.sku.clone().unwrap_or_default(),
                entry.details.clone(),
                entry.user.clone().unwrap_or_else(|| "system".to_string()),
                entry.run_id.clone().unwrap_or_default(),
            ],
        )
    }

    fn read_audit_log(&self, sku: Option<&str>, limit: Option<usize>) -> EngineResult<Vec<AuditLogEntry>> {
        let rows = read_rows(&self.path(AUDIT_LOG_FILE), AUDIT_LOG_HEADER)?;
        let mut entries: Vec<AuditLogEntry> = rows
            .iter()
            .filter(|row| sku.map(|s| row.get("sku") == s).unwrap_or(true))
            .filter_map(|row| {
                let timestamp = chrono::NaiveDateTime::parse_from_str(row.get("timestamp"), "%Y-%m-%d %H:%M:%S%.f")
                    .ok()?
                    .and_utc();
                Some(AuditLogEntry {
                    timestamp,
                    operation: row.get("operation").to_string(),
                    sku: opt_string(row.get("sku")),
                    details: row.get("details").to_string(),
                    user: opt_string(row.get("user")),
                    run_id: opt_string(row.get("run_id")),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
