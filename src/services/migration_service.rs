use crate::db::Storage;
use crate::domain::ledger::StockCalculator;
use crate::domain::models::{
    AuditLogEntry, DemandVariability, EventKind, ForecastMethod, Sku, Transaction, WastePenaltyMode,
};
use crate::error::EngineResult;
use chrono::{Duration, NaiveDate};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub migrated_skus: usize,
    pub message: String,
    pub errors: Vec<String>,
}

/// One-time conversion of a legacy flat inventory snapshot (`sku,
/// description, quantity, ean`) into SNAPSHOT ledger events plus catalog
/// entries for SKUs not already known.
pub struct MigrationService {
    storage: Arc<dyn Storage>,
}

fn default_sku(id: &str, description: &str, ean: Option<String>) -> Sku {
    Sku {
        sku: id.to_string(),
        description: description.to_string(),
        ean,
        moq: 1,
        pack_size: 1,
        lead_time_days: 1,
        review_period_days: 7,
        safety_stock_override: None,
        shelf_life_days: 0,
        min_residual_shelf_life_days: 0,
        reorder_point: None,
        max_stock: 999,
        demand_variability: DemandVariability::Stable,
        target_csl: 0.95,
        forecast_method: ForecastMethod::Simple,
        waste_penalty_mode: WastePenaltyMode::None,
        waste_penalty_factor: 0.0,
        waste_risk_threshold: 0.0,
        waste_horizon_days: 0,
        in_assortment: true,
    }
}

impl MigrationService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn migrate_from_legacy_csv(
        &self,
        legacy_csv_path: &Path,
        snapshot_date: NaiveDate,
        force: bool,
    ) -> EngineResult<MigrationResult> {
        let mut result = MigrationResult::default();

        let existing_txns = self.storage.read_transactions()?;
        if !existing_txns.is_empty() && !force {
            result.message = "ledger already populated; skipping migration (use force to override)".to_string();
            return Ok(result);
        }

        if !legacy_csv_path.exists() {
            result.message = format!("legacy file not found: {}", legacy_csv_path.display());
            return Ok(result);
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(legacy_csv_path)?;
        let headers = reader.headers()?.clone();

        let existing_skus: std::collections::HashSet<String> =
            self.storage.read_skus()?.into_iter().map(|s| s.sku).collect();

        let mut snapshot_txns = Vec::new();
        let mut seen_skus = existing_skus.clone();

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(format!("error reading legacy CSV row: {e}"));
                    continue;
                }
            };
            let get = |name: &str| -> String {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };

            let sku_id = get("sku");
            if sku_id.is_empty() {
                continue;
            }
            let description = get("description");
            let qty: i64 = get("quantity").parse().unwrap_or(0);
            let ean = get("ean");
            let ean = (!ean.is_empty()).then_some(ean);

            snapshot_txns.push(
                Transaction::new(snapshot_date, sku_id.clone(), EventKind::Snapshot, qty)
                    .with_note(format!("migrated from legacy inventory: {description}")),
            );

            if !seen_skus.contains(&sku_id) {
                self.storage.write_sku(&default_sku(&sku_id, &description, ean))?;
                seen_skus.insert(sku_id.clone());
            }

            result.migrated_skus += 1;
        }

        if !snapshot_txns.is_empty() {
            self.storage.append_transactions_batch(&snapshot_txns)?;
            self.storage.append_audit_log(&AuditLogEntry {
                timestamp: chrono::Utc::now(),
                operation: "migrate_from_legacy_csv".to_string(),
                sku: None,
                details: format!("migrated {} SKUs from {}", result.migrated_skus, legacy_csv_path.display()),
                user: None,
                run_id: None,
            })?;
            result.message = format!("successfully migrated {} SKUs", result.migrated_skus);
        }

        Ok(result)
    }

    /// Stock as-of the day after `snapshot_date` must be positive for every
    /// migrated SKU.
    pub fn validate_legacy_migration(&self, snapshot_date: NaiveDate) -> EngineResult<bool> {
        let check_date = snapshot_date + Duration::days(1);
        let skus = self.storage.read_skus()?;
        let transactions = self.storage.read_transactions()?;

        for sku in &skus {
            let stock = StockCalculator::calculate_asof(&sku.sku, check_date, &transactions, None);
            if stock.on_hand <= 0 && stock.on_order <= 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
