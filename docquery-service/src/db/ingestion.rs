//! Ingestion status tracking per index.

use super::Database;
use super::documents::{fetch, store};
use super::models::{Collection, IngestionStatus};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get the ingestion status for an index
    pub fn get_ingestion_status(&self, index_name: &str) -> ServiceResult<Option<IngestionStatus>> {
        let conn = self.conn.lock().unwrap();
        fetch(&conn, Collection::Ingestion, index_name)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(e).into())
    }

    /// Read-modify-write the status for an index, creating it if needed
    pub fn update_ingestion_status(
        &self,
        index_name: &str,
        update: impl FnOnce(&mut IngestionStatus),
    ) -> ServiceResult<IngestionStatus> {
        let conn = self.conn.lock().unwrap();

        let mut status = match fetch(&conn, Collection::Ingestion, index_name)? {
            Some(value) => serde_json::from_value(value).map_err(DatabaseError::Serialization)?,
            None => IngestionStatus::new(index_name),
        };
        update(&mut status);
        status.updated_at = chrono::Utc::now();

        let body = serde_json::to_value(&status).map_err(DatabaseError::Serialization)?;
        store(&conn, Collection::Ingestion, index_name, &body)?;
        Ok(status)
    }

    /// Remove the status record for an index
    pub fn clear_ingestion_status(&self, index_name: &str) -> ServiceResult<bool> {
        self.delete_document(Collection::Ingestion, index_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_creates_then_merges() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_ingestion_status("reports").unwrap().is_none());

        db.update_ingestion_status("reports", |s| {
            s.download_files = vec!["a.pdf".to_string()];
        })
        .unwrap();
        let status = db
            .update_ingestion_status("reports", |s| {
                s.job_id = Some("run-1".to_string());
                s.status = Some("running".to_string());
            })
            .unwrap();

        assert_eq!(status.download_files, vec!["a.pdf"]);
        assert!(status.in_progress());
        assert_eq!(db.get_ingestion_status("reports").unwrap(), Some(status));
    }

    #[test]
    fn test_clear() {
        let db = Database::open_in_memory().unwrap();
        db.update_ingestion_status("reports", |s| s.status = Some("completed".to_string()))
            .unwrap();
        assert!(db.clear_ingestion_status("reports").unwrap());
        assert!(db.get_ingestion_status("reports").unwrap().is_none());
    }
}
