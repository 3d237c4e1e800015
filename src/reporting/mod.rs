//! Admin reporting: classification counts, drop-off, charts, list and export.

pub mod export;
pub mod query;
pub mod routes;
pub mod service;
pub mod stats;

pub use query::{AdminQuery, AssessmentSummary, Page};
pub use routes::{AdminRouteState, admin_routes};
pub use service::ReportService;
