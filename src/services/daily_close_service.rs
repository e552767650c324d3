use crate::db::Storage;
use crate::domain::fefo;
use crate::domain::ledger::calculate_sold_from_eod_stock;
use crate::domain::models::{AuditLogEntry, EventKind, Lot, SalesRecord, Transaction};
use crate::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a single SKU's EOD stock entry.
#[derive(Debug, Clone)]
pub struct EodResult {
    pub sku: String,
    pub sales_record: Option<SalesRecord>,
    pub adjustment_txn: Option<Transaction>,
}

/// End-of-day stock entry: derives the day's sales and any stock
/// discrepancy from a single declared on-hand count, consuming lots FEFO
/// for the derived sale. EOD sales never post a SALE transaction to the
/// ledger — `sales.csv` is their system of record — so FEFO consumption
/// has to be triggered here explicitly.
pub struct DailyCloseWorkflow {
    storage: Arc<dyn Storage>,
}

impl DailyCloseWorkflow {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn process_eod_stock(&self, sku: &str, eod_date: NaiveDate, eod_stock_on_hand: i64) -> EngineResult<EodResult> {
        if eod_stock_on_hand < 0 {
            return Err(EngineError::InvalidInput(format!("EOD stock cannot be negative: {eod_stock_on_hand}")));
        }

        let skus = self.storage.read_skus()?;
        if !skus.iter().any(|s| s.sku == sku) {
            return Err(EngineError::NotFound(format!("SKU {sku} does not exist")));
        }

        let transactions = self.storage.read_transactions()?;
        let sales = self.storage.read_sales()?;

        let (qty_sold, adjustment) =
            calculate_sold_from_eod_stock(sku, eod_date, eod_stock_on_hand, &transactions, Some(&sales));

        let mut sales_record = None;
        if qty_sold > 0 {
            let record = SalesRecord { date: eod_date, sku: sku.to_string(), qty_sold, promo_flag: false };
            self.storage.append_sales(&record)?;
            sales_record = Some(record);

            let lots = self.storage.read_lots()?;
            let sku_lots: Vec<Lot> = lots.iter().filter(|l| l.sku == sku).cloned().collect();
            if !sku_lots.is_empty() {
                let (_records, remaining) = fefo::consume_from_lots(sku, qty_sold, &sku_lots)?;
                let mut updated: Vec<Lot> = lots.into_iter().filter(|l| l.sku != sku).collect();
                updated.extend(remaining);
                self.storage.overwrite_lots(&updated)?;
            }
        }

        let mut adjustment_txn = None;
        if adjustment != 0 {
            let txn = Transaction::new(eod_date, sku, EventKind::Adjust, eod_stock_on_hand)
                .with_note(format!("EOD adjustment (discrepancy: {adjustment:+})"));
            self.storage.append_transaction(&txn)?;
            adjustment_txn = Some(txn);
        }

        self.storage.append_audit_log(&AuditLogEntry {
            timestamp: chrono::Utc::now(),
            operation: "process_eod_stock".to_string(),
            sku: Some(sku.to_string()),
            details: format!("eod_date={eod_date}, declared_on_hand={eod_stock_on_hand}, qty_sold={qty_sold}, adjustment={adjustment}"),
            user: None,
            run_id: None,
        })?;

        Ok(EodResult { sku: sku.to_string(), sales_record, adjustment_txn })
    }

    /// Process every SKU independently; one SKU's failure doesn't stop the
    /// rest of the batch.
    pub fn process_bulk_eod_stock(
        &self,
        eod_entries: &HashMap<String, i64>,
        eod_date: NaiveDate,
    ) -> Vec<EngineResult<EodResult>> {
        eod_entries.iter().map(|(sku, &qty)| self.process_eod_stock(sku, eod_date, qty)).collect()
    }
}
