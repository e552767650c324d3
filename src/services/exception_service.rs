use crate::db::Storage;
use crate::domain::fefo;
use crate::domain::models::{AuditLogEntry, EventKind, Lot, Transaction};
use crate::error::EngineResult;
use chrono::NaiveDate;
use std::sync::Arc;

/// Quick entry for WASTE/ADJUST/UNFULFILLED corrections outside the normal
/// order/receiving flow.
pub struct ExceptionWorkflow {
    storage: Arc<dyn Storage>,
}

fn exception_key(date: NaiveDate, sku: &str, kind: EventKind) -> String {
    format!("{date}_{sku}_{kind:?}")
}

impl ExceptionWorkflow {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn record_audit_entry(&self, sku: &str, kind: EventKind, qty: i64, details: &str) {
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now(),
            operation: format!("record_exception:{kind:?}"),
            sku: Some(sku.to_string()),
            details: format!("qty {qty}; {details}"),
            user: None,
            run_id: None,
        };
        if let Err(err) = self.storage.append_audit_log(&entry) {
            tracing::warn!(sku, ?kind, error = %err, "failed to append audit log entry");
        }
    }

    /// Record a WASTE/ADJUST/UNFULFILLED transaction. Idempotent on
    /// `(date, sku, kind)`: a second call with the same key returns the
    /// matching existing transaction unchanged.
    pub fn record_exception(
        &self,
        kind: EventKind,
        sku: &str,
        qty: i64,
        date: Option<NaiveDate>,
        notes: &str,
    ) -> EngineResult<(Transaction, bool)> {
        assert!(
            matches!(kind, EventKind::Waste | EventKind::Adjust | EventKind::Unfulfilled),
            "record_exception only accepts WASTE, ADJUST, or UNFULFILLED"
        );

        let event_date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let key = exception_key(event_date, sku, kind);

        let existing = self.storage.read_transactions()?;
        if let Some(found) = existing.iter().find(|t| t.date == event_date && t.sku == sku && t.event == kind) {
            return Ok((found.clone(), true));
        }

        let note = format!("{key}; {notes}").trim().to_string();

        if kind == EventKind::Waste && qty > 0 {
            let lots = self.storage.read_lots()?;
            let sku_lots: Vec<Lot> = lots.iter().filter(|l| l.sku == sku).cloned().collect();
            if !sku_lots.is_empty() {
                let (records, remaining) = fefo::consume_from_lots(sku, qty, &sku_lots)?;
                let other_lots: Vec<Lot> = lots.into_iter().filter(|l| l.sku != sku).collect();
                let mut updated = other_lots;
                updated.extend(remaining);
                self.storage.overwrite_lots(&updated)?;

                let txn = Transaction::new(event_date, sku, kind, qty)
                    .with_note(format!("{note} {}", fefo::format_fefo_note(&records)).trim().to_string());
                self.storage.append_transaction(&txn)?;
                self.record_audit_entry(sku, kind, qty, &txn.note);
                return Ok((txn, false));
            }
        }

        let txn = Transaction::new(event_date, sku, kind, qty).with_note(note);
        self.storage.append_transaction(&txn)?;
        self.record_audit_entry(sku, kind, qty, &txn.note);
        Ok((txn, false))
    }

    /// Drop every transaction matching `(date, sku, kind)`, atomically
    /// rewriting the ledger. Returns the number of entries removed.
    pub fn revert_exception_day(&self, date: NaiveDate, sku: &str, kind: EventKind) -> EngineResult<usize> {
        let existing = self.storage.read_transactions()?;
        let before = existing.len();
        let filtered: Vec<Transaction> =
            existing.into_iter().filter(|t| !(t.date == date && t.sku == sku && t.event == kind)).collect();
        let removed = before - filtered.len();

        if removed > 0 {
            self.storage.overwrite_transactions(&filtered)?;
        }
        Ok(removed)
    }
}
