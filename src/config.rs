use serde::{Deserialize, Serialize};
use std::env;

/// Monte Carlo defaults, configurable process-wide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloDefaults {
    pub distribution: String,
    pub n_simulations: u32,
    pub random_seed: u64,
    pub output_stat: String,
    pub output_percentile: u8,
}

impl Default for MonteCarloDefaults {
    fn default() -> Self {
        Self {
            distribution: "empirical".to_string(),
            n_simulations: 1000,
            random_seed: 42,
            output_stat: "mean".to_string(),
            output_percentile: 80,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Flatfile,
    Database,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flatfile" | "files" | "csv" => Ok(StorageBackend::Flatfile),
            "database" | "db" | "sqlite" => Ok(StorageBackend::Database),
            other => Err(format!("unrecognized storage backend: {other}")),
        }
    }
}

/// Process-wide configuration, built once at startup and threaded
/// explicitly through workflows: no process-global singleton read by the
/// storage adapter or demand builder at call time.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub data_dir: std::path::PathBuf,
    pub database_path: std::path::PathBuf,

    pub lead_time_days_default: i64,
    pub order_days: Vec<u8>,
    pub delivery_days: Vec<u8>,

    pub oos_lookback_days: i64,

    pub mc_defaults: MonteCarloDefaults,

    pub expiry_alert_critical_days: i64,
    pub expiry_alert_warning_days: i64,

    pub holiday_json_path: Option<std::path::PathBuf>,

    pub max_backups_per_entity: usize,

    pub log_level: String,
    pub app_name: String,
    pub app_version: String,
}

fn parse_day_list(raw: &str, default: &[u8]) -> Vec<u8> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default.to_vec();
    }
    trimmed
        .split(',')
        .filter_map(|s| s.trim().parse::<u8>().ok())
        .collect()
}

impl Config {
    /// Build configuration from the environment, `.env`-loaded first.
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "flatfile".to_string())
            .parse()
            .unwrap_or(StorageBackend::Flatfile);

        let data_dir = env::var("DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./data/engine.db".to_string())
            .into();

        let lead_time_days_default = env::var("LEAD_TIME_DAYS_DEFAULT")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .expect("LEAD_TIME_DAYS_DEFAULT must be an integer");

        let order_days = parse_day_list(
            &env::var("ORDER_DAYS").unwrap_or_default(),
            &[0, 1, 2, 3, 4],
        );
        let delivery_days = parse_day_list(
            &env::var("DELIVERY_DAYS").unwrap_or_default(),
            &[0, 1, 2, 3, 4, 5],
        );

        let oos_lookback_days = env::var("OOS_LOOKBACK_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let mc_defaults = MonteCarloDefaults {
            distribution: env::var("MC_DISTRIBUTION").unwrap_or_else(|_| "empirical".to_string()),
            n_simulations: env::var("MC_N_SIMULATIONS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            random_seed: env::var("MC_RANDOM_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .unwrap_or(42),
            output_stat: env::var("MC_OUTPUT_STAT").unwrap_or_else(|_| "mean".to_string()),
            output_percentile: env::var("MC_OUTPUT_PERCENTILE")
                .unwrap_or_else(|_| "80".to_string())
                .parse()
                .unwrap_or(80),
        };

        let expiry_alert_critical_days = env::var("EXPIRY_ALERT_CRITICAL_DAYS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);
        let expiry_alert_warning_days = env::var("EXPIRY_ALERT_WARNING_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);

        let holiday_json_path = env::var("HOLIDAY_JSON_PATH").ok().map(Into::into);

        let max_backups_per_entity = env::var("MAX_BACKUPS_PER_ENTITY")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        Ok(Self {
            storage_backend,
            data_dir,
            database_path,
            lead_time_days_default,
            order_days,
            delivery_days,
            oos_lookback_days,
            mc_defaults,
            expiry_alert_critical_days,
            expiry_alert_warning_days,
            holiday_json_path,
            max_backups_per_entity,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "replenish-engine".to_string()),
            app_version: env::var("APP_VERSION").unwrap_or_else(|_| "0.1.0".to_string()),
        })
    }
}
