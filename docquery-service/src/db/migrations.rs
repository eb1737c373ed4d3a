//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called during database initialization; every statement is idempotent.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- JSON documents keyed by (collection, id)
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    Ok(())
}
