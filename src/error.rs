use thiserror::Error;

/// Error kinds for the replenishment engine
///
/// These are abstract categories, not one-error-per-failure-site: workflows
/// map into these kinds so callers can dispatch on recoverability without
/// string-matching messages.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient lot stock for {sku}: requested {requested}, available {available}")]
    InsufficientLotStock {
        sku: String,
        requested: i64,
        available: i64,
    },

    #[error("no delivery window found within 14 days of {0}")]
    NoDeliveryWindow(chrono::NaiveDate),

    #[error("{0} is not an order day")]
    NotAnOrderDay(chrono::NaiveDate),

    #[error("backend busy: {0}")]
    BackendBusy(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("operation cancelled before commit")]
    Cancelled,

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Database(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A non-fatal condition surfaced alongside a successful result
/// (`DataDriftWarning`): the operation still completes, degrading to a
/// neutral value, but callers should be told.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineWarning(pub String);

impl std::fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
