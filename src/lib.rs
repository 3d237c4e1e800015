//! EV Readiness: home-charging survey wizard and reporting service.

pub mod assessment;
pub mod auth;
pub mod config;
pub mod error;
pub mod reference;
pub mod reporting;
pub mod server;
pub mod store;
