//! libSQL backend: async `AssessmentStore` implementation.
//!
//! The full document is stored as a JSON column; progress fields and
//! timestamps are duplicated into plain columns so the store can filter by
//! partition key and creation date without decoding every row.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assessment::model::Assessment;
use crate::error::DatabaseError;
use crate::store::compat::normalize_legacy_keys;
use crate::store::migrations;
use crate::store::traits::{AssessmentStore, DocumentFilter};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp format for columns. Fixed width, so text ordering
/// matches time ordering.
fn fmt_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite datetime() output without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn serialize_document(doc: &Assessment) -> Result<String, DatabaseError> {
    serde_json::to_string(doc)
        .map_err(|e| DatabaseError::Serialization(format!("assessment {}: {e}", doc.id)))
}

/// Decode one row of `ASSESSMENT_COLUMNS`. The version and `updatedAt`
/// columns are authoritative over the copies inside the JSON body.
fn row_to_assessment(row: &libsql::Row) -> Result<Assessment, DatabaseError> {
    let document: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("row_to_assessment document: {e}")))?;
    let version: i64 = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("row_to_assessment version: {e}")))?;
    let updated_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("row_to_assessment updated_at: {e}")))?;

    let value: serde_json::Value = serde_json::from_str(&document)
        .map_err(|e| DatabaseError::Serialization(format!("document is not JSON: {e}")))?;
    let mut doc: Assessment = serde_json::from_value(normalize_legacy_keys(value))
        .map_err(|e| DatabaseError::Serialization(format!("document shape: {e}")))?;

    doc.version = version;
    doc.updated_at = parse_datetime(&updated_str);
    Ok(doc)
}

// ── Trait implementation ────────────────────────────────────────────

const ASSESSMENT_COLUMNS: &str = "document, version, updated_at";

#[async_trait]
impl AssessmentStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create(&self, doc: &Assessment) -> Result<Assessment, DatabaseError> {
        let conn = self.conn();
        let mut stored = doc.clone();
        stored.version = 1;
        stored.updated_at = Utc::now();
        let document = serialize_document(&stored)?;

        conn.execute(
            "INSERT INTO assessments (id, customer_id, current_page, is_complete, document, version, created_at, completed_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                stored.id.to_string(),
                stored.customer_id.clone(),
                stored.current_page as i64,
                stored.is_complete as i64,
                document,
                stored.version,
                fmt_datetime(&stored.created_at),
                opt_text_owned(stored.completed_at.as_ref().map(fmt_datetime)),
                fmt_datetime(&stored.updated_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("create: {e}")))?;

        debug!(id = %stored.id, customer_id = %stored.customer_id, "Assessment inserted");
        Ok(stored)
    }

    async fn read(&self, id: Uuid, customer_id: &str) -> Result<Option<Assessment>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = ?1 AND customer_id = ?2"
                ),
                params![id.to_string(), customer_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("read: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("read: {e}")))?
        {
            Some(row) => Ok(Some(row_to_assessment(&row)?)),
            None => Ok(None),
        }
    }

    async fn replace(
        &self,
        doc: &Assessment,
        expected_version: Option<i64>,
    ) -> Result<Assessment, DatabaseError> {
        let conn = self.conn();
        let mut next = doc.clone();
        next.updated_at = Utc::now();
        let document = serialize_document(&next)?;

        let mut sql = String::from(
            "UPDATE assessments SET current_page = ?3, is_complete = ?4, document = ?5, \
             completed_at = ?6, updated_at = ?7, version = version + 1 \
             WHERE id = ?1 AND customer_id = ?2",
        );
        let mut values = vec![
            libsql::Value::Text(next.id.to_string()),
            libsql::Value::Text(next.customer_id.clone()),
            libsql::Value::Integer(next.current_page as i64),
            libsql::Value::Integer(next.is_complete as i64),
            libsql::Value::Text(document),
            opt_text_owned(next.completed_at.as_ref().map(fmt_datetime)),
            libsql::Value::Text(fmt_datetime(&next.updated_at)),
        ];
        if let Some(expected) = expected_version {
            sql.push_str(" AND version = ?8");
            values.push(libsql::Value::Integer(expected));
        }

        let affected = conn
            .execute(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("replace: {e}")))?;

        if affected == 0 {
            let exists = self.read(next.id, &next.customer_id).await?.is_some();
            return Err(match (exists, expected_version) {
                (true, Some(expected)) => DatabaseError::VersionConflict {
                    id: next.id.to_string(),
                    expected,
                },
                _ => DatabaseError::NotFound {
                    entity: "assessment".to_string(),
                    id: next.id.to_string(),
                },
            });
        }

        let stored = self
            .read(next.id, &next.customer_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "assessment".to_string(),
                id: next.id.to_string(),
            })?;
        debug!(id = %stored.id, version = stored.version, "Assessment replaced");
        Ok(stored)
    }

    async fn query(&self, filter: &DocumentFilter) -> Result<Vec<Assessment>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ASSESSMENT_COLUMNS}, id FROM assessments \
                     WHERE (?1 IS NULL OR customer_id = ?1) \
                       AND (?2 IS NULL OR created_at >= ?2) \
                       AND (?3 IS NULL OR created_at < ?3) \
                     ORDER BY created_at ASC, id ASC"
                ),
                params![
                    opt_text_owned(filter.customer_id.clone()),
                    opt_text_owned(filter.created_from.as_ref().map(fmt_datetime)),
                    opt_text_owned(filter.created_to.as_ref().map(fmt_datetime)),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("query: {e}")))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("query: {e}")))?
        {
            match row_to_assessment(&row) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    let id: String = row.get(3).unwrap_or_default();
                    warn!(id = %id, error = %e, "Skipping malformed assessment row");
                }
            }
        }
        Ok(docs)
    }
}
