//! Persistence layer: libSQL-backed document store for assessments.

pub mod compat;
pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{AssessmentStore, DocumentFilter};
