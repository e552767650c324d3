pub mod adapter;
pub mod flatfile;
pub mod sqlite;

use crate::domain::models::{
    AuditLogEntry, Lot, OrderLog, OrderStatus, PromoWindow, ReceivingLog, SalesRecord, Sku,
    Transaction,
};
use crate::error::EngineResult;

pub use adapter::StorageAdapter;
pub use flatfile::FlatFileStorage;
pub use sqlite::SqliteStorage;

/// Uniform storage surface implemented by both backends.
///
/// Every write is all-or-nothing: callers never observe a partially
/// applied batch. Implementations are blocking; callers that need
/// single-writer-per-entity-family serialization hold the caller-side
/// lock (see `StorageAdapter::writer_lock`) for the duration of a
/// read-modify-write workflow step.
pub trait Storage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn read_skus(&self) -> EngineResult<Vec<Sku>>;
    fn write_sku(&self, sku: &Sku) -> EngineResult<()>;
    fn update_sku(&self, sku: &Sku) -> EngineResult<bool>;
    fn delete_sku(&self, sku_id: &str) -> EngineResult<bool>;

    fn read_transactions(&self) -> EngineResult<Vec<Transaction>>;
    fn append_transaction(&self, txn: &Transaction) -> EngineResult<()>;
    fn append_transactions_batch(&self, txns: &[Transaction]) -> EngineResult<()>;
    fn overwrite_transactions(&self, txns: &[Transaction]) -> EngineResult<()>;

    fn read_sales(&self) -> EngineResult<Vec<SalesRecord>>;
    fn append_sales(&self, rec: &SalesRecord) -> EngineResult<()>;

    fn read_lots(&self) -> EngineResult<Vec<Lot>>;
    fn write_lot(&self, lot: &Lot) -> EngineResult<()>;
    fn overwrite_lots(&self, lots: &[Lot]) -> EngineResult<()>;

    fn read_promo_calendar(&self) -> EngineResult<Vec<PromoWindow>>;
    fn write_promo_window(&self, window: &PromoWindow) -> EngineResult<()>;

    fn read_order_logs(&self) -> EngineResult<Vec<OrderLog>>;
    fn write_order_log(&self, log: &OrderLog) -> EngineResult<()>;
    fn update_order_received_qty(
        &self,
        order_id: &str,
        qty_received: i64,
        status: OrderStatus,
    ) -> EngineResult<bool>;

    fn read_receiving_logs(&self) -> EngineResult<Vec<ReceivingLog>>;
    fn receiving_document_exists(&self, document_id: &str) -> EngineResult<bool>;
    fn write_receiving_log(&self, log: &ReceivingLog) -> EngineResult<()>;

    fn append_audit_log(&self, entry: &AuditLogEntry) -> EngineResult<()>;
    fn read_audit_log(&self, sku: Option<&str>, limit: Option<usize>) -> EngineResult<Vec<AuditLogEntry>>;
}
