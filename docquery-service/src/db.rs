//! Database module for SQLite operations.
//!
//! Stores JSON documents grouped into collections (prompts, logs, ingestion
//! status), standing in for the external document database.

mod documents;
mod ingestion;
mod migrations;
pub mod models;

pub use models::{Collection, IngestionStatus};

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServiceError::Storage {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // WAL lets status polls read while uploads write
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(DatabaseError::Query)?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> ServiceResult<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
