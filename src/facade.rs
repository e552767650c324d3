use crate::config::Config;
use crate::db::{Storage, StorageAdapter};
use crate::domain::calendar::{CalendarConfig, HolidayCalendar};
use crate::error::EngineResult;
use crate::services::daily_close_service::DailyCloseWorkflow;
use crate::services::exception_service::ExceptionWorkflow;
use crate::services::migration_service::MigrationService;
use crate::services::order_service::OrderService;
use crate::services::receiving_service::ReceivingWorkflow;
use std::sync::Arc;

/// Single entry point wiring configuration, storage, and every workflow
/// together. `enginectl` and any embedding caller construct one `Engine`
/// at startup and call through it rather than assembling the pieces
/// themselves.
pub struct Engine {
    pub storage: Arc<dyn Storage>,
    pub orders: OrderService,
    pub receiving: ReceivingWorkflow,
    pub exceptions: ExceptionWorkflow,
    pub daily_close: DailyCloseWorkflow,
    pub migration: MigrationService,
}

impl Engine {
    pub fn new(config: &Config) -> EngineResult<Self> {
        let storage: Arc<dyn Storage> = Arc::new(StorageAdapter::new(config)?);

        let holidays = match &config.holiday_json_path {
            Some(path) => HolidayCalendar::from_json(path),
            None => HolidayCalendar::default(),
        };
        let calendar = CalendarConfig {
            order_days: config.order_days.clone(),
            delivery_days: config.delivery_days.clone(),
            lead_time_days: config.lead_time_days_default,
            holidays,
        };

        Ok(Self {
            orders: OrderService::new(storage.clone(), calendar, config),
            receiving: ReceivingWorkflow::new(storage.clone()),
            exceptions: ExceptionWorkflow::new(storage.clone()),
            daily_close: DailyCloseWorkflow::new(storage.clone()),
            migration: MigrationService::new(storage.clone()),
            storage,
        })
    }
}
