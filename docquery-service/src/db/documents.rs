//! JSON document CRUD operations.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use super::Database;
use super::models::Collection;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// List every document in a collection, ordered by id
    pub fn list_documents(&self, collection: Collection) -> ServiceResult<Vec<Value>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![collection.as_ref()], |row| row.get::<_, String>(0))
            .map_err(DatabaseError::Query)?;

        let mut documents = Vec::new();
        for row in rows {
            let body = row.map_err(DatabaseError::Query)?;
            documents.push(serde_json::from_str(&body).map_err(DatabaseError::Serialization)?);
        }
        Ok(documents)
    }

    /// Get a document by id
    pub fn get_document(&self, collection: Collection, id: &str) -> ServiceResult<Option<Value>> {
        let conn = self.conn.lock().unwrap();
        fetch(&conn, collection, id)
    }

    /// Insert a document. Returns false if the id is already taken.
    pub fn create_document(
        &self,
        collection: Collection,
        id: &str,
        body: &Value,
    ) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();
        let body = serde_json::to_string(body).map_err(DatabaseError::Serialization)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
                params![collection.as_ref(), id, body],
            )
            .map_err(DatabaseError::Query)?;

        Ok(inserted > 0)
    }

    /// Insert or replace a document
    pub fn upsert_document(&self, collection: Collection, id: &str, body: &Value) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();
        store(&conn, collection, id, body)
    }

    /// Delete a document. Returns whether it existed.
    pub fn delete_document(&self, collection: Collection, id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_ref(), id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(deleted > 0)
    }
}

pub(super) fn fetch(conn: &Connection, collection: Collection, id: &str) -> ServiceResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_ref(), id],
            |row| row.get(0),
        )
        .optional()
        .map_err(DatabaseError::Query)?;

    body.map(|b| serde_json::from_str(&b))
        .transpose()
        .map_err(|e| DatabaseError::Serialization(e).into())
}

pub(super) fn store(
    conn: &Connection,
    collection: Collection,
    id: &str,
    body: &Value,
) -> ServiceResult<()> {
    let body = serde_json::to_string(body).map_err(DatabaseError::Serialization)?;
    conn.execute(
        "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, datetime('now')) \
         ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![collection.as_ref(), id, body],
    )
    .map_err(DatabaseError::Query)?;
    Ok(())
}
