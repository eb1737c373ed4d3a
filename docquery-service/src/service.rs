//! Service coordinator shared by all HTTP handlers.

mod files;
mod jobs;
mod prompts;
mod streaming;

pub use files::IndexDocument;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::ServiceConfig;
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::jobs::{LocalJobRunner, RemoteJobClient};
use crate::search::{SearchEngine, is_safe_segment};

/// Main service coordinator
pub struct DocQueryService {
    pub config: Arc<ServiceConfig>,
    pub db: Arc<Database>,
    engine: Arc<dyn SearchEngine>,
    local_jobs: LocalJobRunner,
    remote_jobs: RemoteJobClient,
}

impl DocQueryService {
    /// Create a new service instance around a search engine
    pub fn new(
        config: Arc<ServiceConfig>,
        db: Arc<Database>,
        engine: Arc<dyn SearchEngine>,
    ) -> ServiceResult<Self> {
        info!(
            ingestion_root = %config.storage.ingestion_root.display(),
            "Initializing docquery service"
        );

        let local_jobs = LocalJobRunner::new(config.jobs.local.clone());
        let remote_jobs = RemoteJobClient::new(config.jobs.remote.clone())?;

        if local_jobs.enabled() {
            info!(program = %config.jobs.local.program, "Local job runner enabled");
        }
        if let Some(url) = &config.jobs.remote.base_url {
            info!(url = %url, "Remote job service enabled");
        }

        Ok(Self {
            config,
            db,
            engine,
            local_jobs,
            remote_jobs,
        })
    }

    /// `<ingestion_root>/<index_name>`, rejecting names that would escape it
    pub(crate) fn index_directory(&self, index_name: &str) -> ServiceResult<PathBuf> {
        if !is_safe_segment(index_name) {
            return Err(ServiceError::InvalidRequest {
                message: format!("Invalid index name: {index_name:?}"),
            });
        }
        Ok(self.config.storage.ingestion_root.join(index_name))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A service rooted in a temp directory with an in-memory database
    pub(crate) fn service_with_engine(
        root: &std::path::Path,
        engine: Arc<dyn SearchEngine>,
    ) -> DocQueryService {
        let mut config = ServiceConfig::default();
        config.storage.data_dir = root.join("data");
        config.storage.ingestion_root = root.join("ingestion");
        config.storage.prompts_dir = root.join("prompts");
        config.storage.processing_plan = root.join("processing_plan.json");

        let db = Arc::new(Database::open_in_memory().unwrap());
        DocQueryService::new(Arc::new(config), db, engine).unwrap()
    }
}
