//! Version-tracked database migrations for the libSQL backend.
//!
//! Migrations are numbered; `_migrations` records the ones applied. Names
//! are plain identifiers so they can be recorded inline.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "assessments",
        sql: r#"
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                current_page INTEGER NOT NULL DEFAULT 0,
                is_complete INTEGER NOT NULL DEFAULT 0,
                document TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (id, customer_id)
            );
            CREATE INDEX IF NOT EXISTS idx_assessments_customer ON assessments(customer_id);
        "#,
    },
    Migration {
        version: 2,
        name: "reporting_indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_assessments_created ON assessments(created_at);
            CREATE INDEX IF NOT EXISTS idx_assessments_progress
                ON assessments(is_complete, current_page);
        "#,
    },
];

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Bring the schema up to the latest version.
///
/// Each pending migration runs in its own transaction together with its
/// `_migrations` record, so a failed step leaves the previous version intact.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(MIGRATIONS_TABLE, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("_migrations table: {e}")))?;

    let applied = applied_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        let batch = format!(
            "BEGIN;\n{}\nINSERT INTO _migrations (version, name) VALUES ({}, '{}');\nCOMMIT;",
            migration.sql, migration.version, migration.name
        );
        if let Err(e) = conn.execute_batch(&batch).await {
            let _ = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::Migration(format!(
                "V{} {}: {e}",
                migration.version, migration.name
            )));
        }
    }

    let version = applied_version(conn).await?;
    tracing::info!(version, "Schema migrated");
    Ok(())
}

/// Highest recorded version; 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| DatabaseError::Migration(format!("schema version is not an integer: {e}")))
}
