//! `AssessmentStore` trait: the document store boundary.
//!
//! Documents are addressed by `(id, customer_id)`; the customer id is the
//! partition key and is required on every point read and replace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::assessment::model::Assessment;
use crate::error::DatabaseError;

/// Predicates the store evaluates itself. Everything else is filtered in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub customer_id: Option<String>,
    /// Inclusive lower bound on `createdAt`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `createdAt`.
    pub created_to: Option<DateTime<Utc>>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            ..Self::default()
        }
    }
}

/// Backend-agnostic persistence for assessment documents.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert a new document. Returns it as stored (version 1).
    async fn create(&self, doc: &Assessment) -> Result<Assessment, DatabaseError>;

    /// Point read by id and partition key.
    async fn read(&self, id: Uuid, customer_id: &str) -> Result<Option<Assessment>, DatabaseError>;

    /// Replace the whole document, bumping its version and `updatedAt`.
    ///
    /// With `expected_version` set, the write only happens if the stored
    /// version still matches; otherwise `VersionConflict`. Missing documents
    /// yield `NotFound`.
    async fn replace(
        &self,
        doc: &Assessment,
        expected_version: Option<i64>,
    ) -> Result<Assessment, DatabaseError>;

    /// All documents matching the filter, oldest first. Rows that fail to
    /// decode are skipped.
    async fn query(&self, filter: &DocumentFilter) -> Result<Vec<Assessment>, DatabaseError>;
}
