pub mod auth;
pub mod costing;
pub mod migrate;
pub mod planning;
pub mod production;
pub mod reconciliation;
pub mod sales;
pub mod seed;
pub mod stock;
pub mod validation;
