//! Database model structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;

/// Document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    /// Prompt documents edited through `/prompt`
    Prompts,
    /// Ingestion logs, one document per index
    Logs,
    /// Ingestion job tracking, one [`IngestionStatus`] per index
    Ingestion,
}

/// Ingestion tracking for one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub index_name: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub download_files: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionStatus {
    pub fn new(index_name: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            job_id: None,
            status: None,
            download_files: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Whether a submitted job has not reported a terminal state yet
    pub fn in_progress(&self) -> bool {
        matches!(self.status.as_deref(), Some("running") | Some("queued"))
    }
}
