use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Demand-variability classification tag carried on a SKU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DemandVariability {
    Stable,
    Variable,
    Intermittent,
}

/// Waste-penalty application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WastePenaltyMode {
    None,
    Soft,
    Hard,
}

/// Forecast method tag a SKU is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Simple,
    MonteCarlo,
    Croston,
    Sba,
    Tsb,
    IntermittentAuto,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::Simple => "simple",
            ForecastMethod::MonteCarlo => "monte_carlo",
            ForecastMethod::Croston => "croston",
            ForecastMethod::Sba => "sba",
            ForecastMethod::Tsb => "tsb",
            ForecastMethod::IntermittentAuto => "intermittent_auto",
        }
    }
}

/// Product catalog entry. SKUs own their policy fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sku {
    pub sku: String,
    pub description: String,
    pub ean: Option<String>,

    pub moq: i64,
    pub pack_size: i64,
    pub lead_time_days: i64,
    pub review_period_days: i64,
    pub safety_stock_override: Option<f64>,

    /// 0 means non-perishable.
    pub shelf_life_days: i64,
    pub min_residual_shelf_life_days: i64,

    pub reorder_point: Option<i64>,
    pub max_stock: i64,

    pub demand_variability: DemandVariability,
    pub target_csl: f64,
    pub forecast_method: ForecastMethod,

    pub waste_penalty_mode: WastePenaltyMode,
    pub waste_penalty_factor: f64,
    pub waste_risk_threshold: f64,
    pub waste_horizon_days: i64,

    pub in_assortment: bool,
}

/// Ledger event kind, with a fixed reduction priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Snapshot,
    Order,
    Receipt,
    Sale,
    Waste,
    Adjust,
    Unfulfilled,
    AssortmentIn,
    AssortmentOut,
}

impl EventKind {
    /// SNAPSHOT (0) -> ORDER/RECEIPT (1) -> SALE/WASTE/ADJUST (2) -> UNFULFILLED (3).
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::Snapshot => 0,
            EventKind::Order | EventKind::Receipt => 1,
            EventKind::Sale | EventKind::Waste | EventKind::Adjust => 2,
            EventKind::Unfulfilled => 3,
            EventKind::AssortmentIn | EventKind::AssortmentOut => 2,
        }
    }
}

/// Append-only ledger event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub sku: String,
    pub event: EventKind,
    pub qty: i64,
    pub receipt_date: Option<NaiveDate>,
    pub note: String,
}

impl Transaction {
    pub fn new(date: NaiveDate, sku: impl Into<String>, event: EventKind, qty: i64) -> Self {
        Self {
            date,
            sku: sku.into(),
            event,
            qty,
            receipt_date: None,
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_receipt_date(mut self, receipt_date: NaiveDate) -> Self {
        self.receipt_date = Some(receipt_date);
        self
    }
}

/// Daily sales record; (date, sku) is a natural key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub sku: String,
    pub qty_sold: i64,
    pub promo_flag: bool,
}

/// Inventory lot with expiry tracking No expiry means infinite
/// shelf life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub lot_id: String,
    pub sku: String,
    pub expiry_date: Option<NaiveDate>,
    pub qty_on_hand: i64,
    pub receipt_id: String,
    pub receipt_date: NaiveDate,
}

/// Order status, derived from qty_ordered/qty_received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Partial,
    Received,
}

impl OrderStatus {
    pub fn derive(qty_ordered: i64, qty_received: i64) -> Self {
        if qty_received <= 0 {
            OrderStatus::Pending
        } else if qty_received >= qty_ordered {
            OrderStatus::Received
        } else {
            OrderStatus::Partial
        }
    }
}

/// Open-order log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLog {
    pub order_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_ordered: i64,
    pub qty_received: i64,
    pub status: OrderStatus,
    pub receipt_date: NaiveDate,
    /// Prebuild metadata (e.g. promo context); opaque free text.
    pub prebuild_metadata: String,
}

/// Receiving-log entry; `document_id` is the idempotency key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivingLog {
    pub document_id: String,
    pub receipt_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_received: i64,
    pub receipt_date: NaiveDate,
    /// Comma-joined order_ids fulfilled by this document/sku line.
    pub order_ids: String,
}

/// Promotional window; overlap within (sku, store_id) is forbidden unless
/// explicitly allowed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoWindow {
    pub sku: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub store_id: Option<String>,
    pub promo_flag: bool,
}

impl PromoWindow {
    pub fn overlaps(&self, other: &PromoWindow) -> bool {
        self.sku == other.sku
            && self.store_id == other.store_id
            && self.start_date <= other.end_date
            && other.start_date <= self.end_date
    }
}

/// Append-only audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub operation: String,
    pub sku: Option<String>,
    pub details: String,
    pub user: Option<String>,
    pub run_id: Option<String>,
}
