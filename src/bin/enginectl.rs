use clap::{Parser, Subcommand};
use replenish_engine::config::Config;
use replenish_engine::facade::Engine;
use replenish_engine::maintenance;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "enginectl", about = "Replenishment engine maintenance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Integrity + referential + invariant check.
    DbCheck,
    /// Reindex and vacuum the database backend.
    DbReindexVacuum,
    /// Restore an entity's CSV from its most recent backup file.
    RestoreBackup {
        /// Entity name, e.g. "transactions", "skus".
        entity: String,
    },
    /// Export a full CSV snapshot with a manifest.
    ExportSnapshot {
        #[arg(default_value = "./snapshot")]
        out_dir: PathBuf,
    },
    /// Export a diagnostic bundle (snapshot + config + integrity report).
    ExportDebugBundle {
        #[arg(default_value = "./debug-bundle")]
        out_dir: PathBuf,
    },
    /// One-time migration from a legacy flat inventory CSV.
    MigrateLegacy {
        legacy_csv_path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "replenish_engine=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::from(maintenance::EXIT_FAIL as u8);
        }
    };

    let exit_code = match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("command failed: {err}");
            maintenance::EXIT_FAIL
        }
    };

    ExitCode::from(exit_code as u8)
}

fn run(command: Command, config: &Config) -> replenish_engine::error::EngineResult<i32> {
    match command {
        Command::DbCheck => {
            let engine = Engine::new(config)?;
            let report = maintenance::db_check(engine.storage.as_ref(), config)?;
            print_report(&report);
            Ok(report.exit_code)
        }
        Command::DbReindexVacuum => {
            let report = maintenance::db_reindex_vacuum(config)?;
            print_report(&report);
            Ok(report.exit_code)
        }
        Command::RestoreBackup { entity } => {
            let report = maintenance::restore_backup(&config.data_dir, &entity)?;
            print_report(&report);
            Ok(report.exit_code)
        }
        Command::ExportSnapshot { out_dir } => {
            let engine = Engine::new(config)?;
            let report = maintenance::export_snapshot(engine.storage.as_ref(), &out_dir)?;
            print_report(&report);
            Ok(report.exit_code)
        }
        Command::ExportDebugBundle { out_dir } => {
            let engine = Engine::new(config)?;
            let report = maintenance::export_debug_bundle(engine.storage.as_ref(), config, &out_dir)?;
            print_report(&report);
            Ok(report.exit_code)
        }
        Command::MigrateLegacy { legacy_csv_path, force } => {
            let engine = Engine::new(config)?;
            let snapshot_date = chrono::Utc::now().date_naive();
            let result = engine.migration.migrate_from_legacy_csv(&legacy_csv_path, snapshot_date, force)?;
            println!("{}", result.message);
            for error in &result.errors {
                eprintln!("warning: {error}");
            }
            if !result.errors.is_empty() {
                return Ok(maintenance::EXIT_WARN);
            }
            Ok(maintenance::EXIT_PASS)
        }
    }
}

fn print_report(report: &maintenance::CheckReport) {
    for message in &report.messages {
        println!("{message}");
    }
}
