pub mod calendar;
pub mod demand_builder;
pub mod fefo;
pub mod forecast;
pub mod intermittent;
pub mod ledger;
pub mod models;
pub mod uncertainty;
