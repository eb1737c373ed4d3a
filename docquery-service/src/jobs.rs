//! Ingestion job runners.
//!
//! Two backends: a local subprocess runner meant for development, and a
//! remote HTTP job service. Both receive the same [`IngestionParams`].

mod local;
mod remote;

pub use local::{LocalJobRunner, LocalJobState};
pub use remote::RemoteJobClient;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::JobError;

/// Ingestion job request body
#[derive(Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub index_name: String,
    pub num_threads: u32,
    /// Password for protected documents. Never logged.
    pub password: String,
    pub delete_existing_output_dir: bool,
    pub processing_mode_pdf: String,
    pub processing_mode_docx: String,
    pub processing_mode_xlsx: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub verbose: bool,
}

/// Full parameter set handed to the ingestion script
#[derive(Clone, Serialize)]
pub struct IngestionParams {
    #[serde(flatten)]
    pub request: JobRequest,
    pub download_directory: PathBuf,
    pub ingestion_directory: PathBuf,
    pub models: Vec<String>,
    pub vision_models: Vec<String>,
}

impl IngestionParams {
    pub fn to_json(&self) -> Result<String, JobError> {
        serde_json::to_string(self).map_err(JobError::Encode)
    }
}

/// Job runners that can be enabled through configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum JobRunnerKind {
    #[strum(serialize = "Remote Job Service")]
    #[serde(rename = "Remote Job Service")]
    Remote,
    #[strum(serialize = "Subprocess (Local Testing)")]
    #[serde(rename = "Subprocess (Local Testing)")]
    Local,
}
