use super::{FlatFileStorage, SqliteStorage, Storage};
use crate::config::{Config, StorageBackend};
use crate::domain::models::{
    AuditLogEntry, Lot, OrderLog, OrderStatus, PromoWindow, ReceivingLog, SalesRecord, Sku,
    Transaction,
};
use crate::error::{EngineError, EngineResult};
use std::sync::Mutex;

/// Entity family used to key single-writer-per-family serialization at the
/// adapter level. Two workflow steps touching different families (e.g. a
/// receiving-log append and a sales-record append) may proceed concurrently;
/// two steps touching the same family are serialized so a read-modify-write
/// sequence never races itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFamily {
    Skus,
    Transactions,
    Sales,
    Lots,
    Orders,
    Receiving,
    Audit,
    Promo,
}

struct FamilyLocks {
    skus: Mutex<()>,
    transactions: Mutex<()>,
    sales: Mutex<()>,
    lots: Mutex<()>,
    orders: Mutex<()>,
    receiving: Mutex<()>,
    audit: Mutex<()>,
    promo: Mutex<()>,
}

impl Default for FamilyLocks {
    fn default() -> Self {
        Self {
            skus: Mutex::new(()),
            transactions: Mutex::new(()),
            sales: Mutex::new(()),
            lots: Mutex::new(()),
            orders: Mutex::new(()),
            receiving: Mutex::new(()),
            audit: Mutex::new(()),
            promo: Mutex::new(()),
        }
    }
}

/// Routes calls to the configured backend, falling back to the flat-file
/// backend on any database error. The flat-file backend is always present
/// and always kept current, so a database outage degrades the process to
/// file-backed persistence rather than failing workflow steps outright.
pub struct StorageAdapter {
    flatfile: FlatFileStorage,
    database: Option<SqliteStorage>,
    backend: StorageBackend,
    locks: FamilyLocks,
}

impl StorageAdapter {
    pub fn new(config: &Config) -> EngineResult<Self> {
        let flatfile = FlatFileStorage::new(&config.data_dir, config.max_backups_per_entity)?;
        let database = match config.storage_backend {
            StorageBackend::Database => Some(SqliteStorage::open(&config.database_path)?),
            StorageBackend::Flatfile => None,
        };
        Ok(Self { flatfile, database, backend: config.storage_backend, locks: FamilyLocks::default() })
    }

    pub fn is_sqlite_mode(&self) -> bool {
        self.backend == StorageBackend::Database && self.database.is_some()
    }

    pub fn writer_lock(&self, family: EntityFamily) -> std::sync::MutexGuard<'_, ()> {
        match family {
            EntityFamily::Skus => self.locks.skus.lock().unwrap(),
            EntityFamily::Transactions => self.locks.transactions.lock().unwrap(),
            EntityFamily::Sales => self.locks.sales.lock().unwrap(),
            EntityFamily::Lots => self.locks.lots.lock().unwrap(),
            EntityFamily::Orders => self.locks.orders.lock().unwrap(),
            EntityFamily::Receiving => self.locks.receiving.lock().unwrap(),
            EntityFamily::Audit => self.locks.audit.lock().unwrap(),
            EntityFamily::Promo => self.locks.promo.lock().unwrap(),
        }
    }

    /// Run `op` against the database backend if configured, falling back to
    /// the flat-file backend (with a warning) on any database error or when
    /// no database backend is configured.
    fn route<T>(
        &self,
        op_name: &str,
        db_op: impl FnOnce(&SqliteStorage) -> EngineResult<T>,
        file_op: impl FnOnce(&FlatFileStorage) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if let Some(db) = &self.database {
            match db_op(db) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        operation = op_name,
                        error = %err,
                        "database backend failed, falling back to flat-file storage"
                    );
                }
            }
        }
        file_op(&self.flatfile)
    }
}

impl Storage for StorageAdapter {
    fn backend_name(&self) -> &'static str {
        if self.is_sqlite_mode() { "sqlite" } else { "flatfile" }
    }

    fn read_skus(&self) -> EngineResult<Vec<Sku>> {
        self.route("read_skus", |d| d.read_skus(), |f| f.read_skus())
    }
    fn write_sku(&self, sku: &Sku) -> EngineResult<()> {
        self.route("write_sku", |d| d.write_sku(sku), |f| f.write_sku(sku))
    }
    fn update_sku(&self, sku: &Sku) -> EngineResult<bool> {
        self.route("update_sku", |d| d.update_sku(sku), |f| f.update_sku(sku))
    }
    fn delete_sku(&self, sku_id: &str) -> EngineResult<bool> {
        self.route("delete_sku", |d| d.delete_sku(sku_id), |f| f.delete_sku(sku_id))
    }

    fn read_transactions(&self) -> EngineResult<Vec<Transaction>> {
        self.route("read_transactions", |d| d.read_transactions(), |f| f.read_transactions())
    }
    fn append_transaction(&self, txn: &Transaction) -> EngineResult<()> {
        self.route("append_transaction", |d| d.append_transaction(txn), |f| f.append_transaction(txn))
    }
    fn append_transactions_batch(&self, txns: &[Transaction]) -> EngineResult<()> {
        self.route(
            "append_transactions_batch",
            |d| d.append_transactions_batch(txns),
            |f| f.append_transactions_batch(txns),
        )
    }
    fn overwrite_transactions(&self, txns: &[Transaction]) -> EngineResult<()> {
        self.route(
            "overwrite_transactions",
            |d| d.overwrite_transactions(txns),
            |f| f.overwrite_transactions(txns),
        )
    }

    fn read_sales(&self) -> EngineResult<Vec<SalesRecord>> {
        self.route("read_sales", |d| d.read_sales(), |f| f.read_sales())
    }
    fn append_sales(&self, rec: &SalesRecord) -> EngineResult<()> {
        self.route("append_sales", |d| d.append_sales(rec), |f| f.append_sales(rec))
    }

    fn read_lots(&self) -> EngineResult<Vec<Lot>> {
        self.route("read_lots", |d| d.read_lots(), |f| f.read_lots())
    }
    fn write_lot(&self, lot: &Lot) -> EngineResult<()> {
        self.route("write_lot", |d| d.write_lot(lot), |f| f.write_lot(lot))
    }
    fn overwrite_lots(&self, lots: &[Lot]) -> EngineResult<()> {
        self.route("overwrite_lots", |d| d.overwrite_lots(lots), |f| f.overwrite_lots(lots))
    }

    fn read_promo_calendar(&self) -> EngineResult<Vec<PromoWindow>> {
        // Promo calendar maintenance is only implemented against the
        // flat-file backend; the database schema carries the table for
        // completeness but the adapter never writes to it.
        self.flatfile.read_promo_calendar()
    }
    fn write_promo_window(&self, window: &PromoWindow) -> EngineResult<()> {
        let _guard = self.writer_lock(EntityFamily::Promo);
        let existing = self.flatfile.read_promo_calendar()?;
        if let Some(conflict) = existing.iter().find(|w| w.overlaps(window)) {
            return Err(EngineError::Conflict(format!(
                "promo window {} {}..{} (store {:?}) overlaps existing window {}..{} (store {:?})",
                window.sku,
                window.start_date,
                window.end_date,
                window.store_id,
                conflict.start_date,
                conflict.end_date,
                conflict.store_id
            )));
        }
        self.flatfile.write_promo_window(window)
    }

    fn read_order_logs(&self) -> EngineResult<Vec<OrderLog>> {
        self.route("read_order_logs", |d| d.read_order_logs(), |f| f.read_order_logs())
    }
    fn write_order_log(&self, log: &OrderLog) -> EngineResult<()> {
        self.route("write_order_log", |d| d.write_order_log(log), |f| f.write_order_log(log))
    }
    fn update_order_received_qty(
        &self,
        order_id: &str,
        qty_received: i64,
        status: OrderStatus,
    ) -> EngineResult<bool> {
        self.route(
            "update_order_received_qty",
            |d| d.update_order_received_qty(order_id, qty_received, status),
            |f| f.update_order_received_qty(order_id, qty_received, status),
        )
    }

    fn read_receiving_logs(&self) -> EngineResult<Vec<ReceivingLog>> {
        self.route("read_receiving_logs", |d| d.read_receiving_logs(), |f| f.read_receiving_logs())
    }
    fn receiving_document_exists(&self, document_id: &str) -> EngineResult<bool> {
        self.route(
            "receiving_document_exists",
            |d| d.receiving_document_exists(document_id),
            |f| f.receiving_document_exists(document_id),
        )
    }
    fn write_receiving_log(&self, log: &ReceivingLog) -> EngineResult<()> {
        self.route("write_receiving_log", |d| d.write_receiving_log(log), |f| f.write_receiving_log(log))
    }

    fn append_audit_log(&self, entry: &AuditLogEntry) -> EngineResult<()> {
        // Audit entries are write-only and must never silently vanish on a
        // database hiccup, so they always land in both places when a
        // database is configured.
        if let Some(db) = &self.database {
            if let Err(err) = db.append_audit_log(entry) {
                tracing::warn!(error = %err, "audit log write to database backend failed");
            }
        }
        self.flatfile.append_audit_log(entry)
    }
    fn read_audit_log(&self, sku: Option<&str>, limit: Option<usize>) -> EngineResult<Vec<AuditLogEntry>> {
        self.route(
            "read_audit_log",
            |d| d.read_audit_log(sku, limit),
            |f| f.read_audit_log(sku, limit),
        )
    }
}
