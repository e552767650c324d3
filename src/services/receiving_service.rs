use crate::db::Storage;
use crate::domain::models::{AuditLogEntry, EventKind, OrderStatus, Transaction};
use crate::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One line of a receiving document.
#[derive(Debug, Clone)]
pub struct ReceivingItem {
    pub sku: String,
    pub qty_received: i64,
    /// Orders to allocate to, preserving caller-given order. `None` means
    /// allocate FIFO across every PENDING/PARTIAL order for the SKU.
    pub order_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: String,
    pub qty_received_total: i64,
    pub new_status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct ReceivingOutcome {
    pub transactions: Vec<Transaction>,
    pub already_processed: bool,
    pub order_updates: Vec<OrderUpdate>,
}

/// Document-idempotent reconciliation: one document closes every item it
/// lists in a single atomic batch, or (if already processed) changes
/// nothing at all.
pub struct ReceivingWorkflow {
    storage: Arc<dyn Storage>,
}

impl ReceivingWorkflow {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn close_receipt_by_document(
        &self,
        document_id: &str,
        receipt_date: NaiveDate,
        items: &[ReceivingItem],
        notes: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<ReceivingOutcome> {
        if self.storage.receiving_document_exists(document_id)? {
            return Ok(ReceivingOutcome { transactions: Vec::new(), already_processed: true, order_updates: Vec::new() });
        }

        let mut order_logs = self.storage.read_order_logs()?;

        let mut transactions = Vec::new();
        let mut order_updates: Vec<OrderUpdate> = Vec::new();
        let mut receiving_log_lines: Vec<(String, i64, Vec<String>)> = Vec::new();

        for item in items {
            let mut sku_orders: Vec<usize> = order_logs
                .iter()
                .enumerate()
                .filter(|(_, o)| o.sku == item.sku && matches!(o.status, OrderStatus::Pending | OrderStatus::Partial))
                .map(|(i, _)| i)
                .collect();
            sku_orders.sort_by_key(|&i| order_logs[i].date);

            let target_indices: Vec<usize> = match &item.order_ids {
                Some(ids) if !ids.is_empty() => {
                    let restricted: Vec<usize> =
                        sku_orders.iter().copied().filter(|&i| ids.contains(&order_logs[i].order_id)).collect();
                    if restricted.is_empty() { sku_orders.clone() } else { restricted }
                }
                _ => sku_orders.clone(),
            };

            if target_indices.is_empty() {
                transactions.push(
                    Transaction::new(receipt_date, item.sku.clone(), EventKind::Receipt, item.qty_received)
                        .with_receipt_date(receipt_date)
                        .with_note(format!("document {document_id} (no matching orders); {notes}").trim().to_string()),
                );
                receiving_log_lines.push((item.sku.clone(), item.qty_received, Vec::new()));
                continue;
            }

            let mut remaining = item.qty_received;
            let mut allocated_order_ids = Vec::new();

            for &idx in &target_indices {
                if remaining <= 0 {
                    break;
                }
                let order = &order_logs[idx];
                let still_needed = order.qty_ordered - order.qty_received;
                if still_needed <= 0 {
                    continue;
                }
                let allocate = remaining.min(still_needed);
                let new_total = order.qty_received + allocate;
                let new_status = OrderStatus::derive(order.qty_ordered, new_total);

                order_logs[idx].qty_received = new_total;
                order_logs[idx].status = new_status;

                allocated_order_ids.push(order.order_id.clone());
                order_updates.push(OrderUpdate { order_id: order.order_id.clone(), qty_received_total: new_total, new_status });
                remaining -= allocate;
            }

            transactions.push(
                Transaction::new(receipt_date, item.sku.clone(), EventKind::Receipt, item.qty_received)
                    .with_receipt_date(receipt_date)
                    .with_note(
                        format!("document {document_id}, orders: {}; {notes}", allocated_order_ids.join(","))
                            .trim()
                            .to_string(),
                    ),
            );

            // Mirrors the source workflow's defensive check: a RECEIVED
            // order can only be short if it was force-closed by an
            // external policy outside this allocation loop. Under this
            // allocation logic alone the condition never fires.
            for update in &order_updates {
                let order = order_logs.iter().find(|o| o.order_id == update.order_id);
                if let Some(order) = order {
                    if update.new_status == OrderStatus::Received && update.qty_received_total < order.qty_ordered {
                        let shortfall = order.qty_ordered - update.qty_received_total;
                        transactions.push(
                            Transaction::new(receipt_date, item.sku.clone(), EventKind::Unfulfilled, shortfall).with_note(format!(
                                "order {} closed by document {document_id} with shortfall",
                                update.order_id
                            )),
                        );
                    }
                }
            }

            receiving_log_lines.push((item.sku.clone(), item.qty_received, allocated_order_ids));
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        self.storage.append_transactions_batch(&transactions)?;
        for update in &order_updates {
            self.storage.update_order_received_qty(&update.order_id, update.qty_received_total, update.new_status)?;
        }
        for (sku, qty, order_ids) in &receiving_log_lines {
            self.storage.write_receiving_log(&crate::domain::models::ReceivingLog {
                document_id: document_id.to_string(),
                receipt_id: document_id.to_string(),
                date: receipt_date,
                sku: sku.clone(),
                qty_received: *qty,
                receipt_date,
                order_ids: order_ids.join(","),
            })?;
            self.storage.append_audit_log(&AuditLogEntry {
                timestamp: chrono::Utc::now(),
                operation: "close_receipt_by_document".to_string(),
                sku: Some(sku.clone()),
                details: format!("document {document_id}: received {qty} units against orders [{}]", order_ids.join(",")),
                user: None,
                run_id: None,
            })?;
        }

        Ok(ReceivingOutcome { transactions, already_processed: false, order_updates })
    }
}
