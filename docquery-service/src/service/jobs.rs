//! Ingestion job submission and status tracking.

use tracing::{info, warn};

use super::DocQueryService;
use crate::db::IngestionStatus;
use crate::error::{JobError, ServiceResult};
use crate::jobs::{IngestionParams, JobRequest, JobRunnerKind, LocalJobState};

impl DocQueryService {
    /// Runners enabled by configuration, remote first
    pub fn job_runners(&self) -> Vec<JobRunnerKind> {
        let mut runners = Vec::new();
        if self.remote_jobs.enabled() {
            runners.push(JobRunnerKind::Remote);
        }
        if self.local_jobs.enabled() {
            runners.push(JobRunnerKind::Local);
        }
        runners
    }

    pub fn models(&self) -> &[String] {
        &self.config.search.models
    }

    /// Parameters for an ingestion run over `index_name`'s downloads
    fn ingestion_params(
        &self,
        index_name: &str,
        mut request: JobRequest,
    ) -> ServiceResult<IngestionParams> {
        let download_directory = self.ensure_download_directory(index_name)?;
        let ingestion_directory = self.index_directory(index_name)?;
        request.index_name = index_name.to_string();

        Ok(IngestionParams {
            request,
            download_directory,
            ingestion_directory,
            models: self.config.search.models.clone(),
            vision_models: self.config.search.models.clone(),
        })
    }

    /// Submit to the remote job service and record the job as running
    pub async fn submit_remote_job(
        &self,
        index_name: &str,
        request: JobRequest,
    ) -> ServiceResult<String> {
        let params = self.ingestion_params(index_name, request)?;
        if let Some(existing) = self.db.get_ingestion_status(index_name)?
            && existing.in_progress()
        {
            warn!(
                index = %index_name,
                job_id = ?existing.job_id,
                "Submitting while a previous ingestion job is still running"
            );
        }
        let job_id = self.remote_jobs.submit(&params).await?;

        let recorded = job_id.clone();
        self.db.update_ingestion_status(index_name, |status| {
            status.job_id = Some(recorded);
            status.status = Some("running".to_string());
        })?;

        info!(index = %index_name, job_id = %job_id, "Remote ingestion job recorded");
        Ok(job_id)
    }

    /// Spawn the ingestion script locally, returning its PID
    pub fn submit_local_job(&self, index_name: &str, request: JobRequest) -> ServiceResult<u32> {
        let params = self.ingestion_params(index_name, request)?;
        Ok(self.local_jobs.spawn(&params)?)
    }

    pub async fn remote_job_status(&self, job_id: &str) -> ServiceResult<String> {
        let status = self.remote_jobs.status(job_id).await?;
        info!(job_id = %job_id, status = %status, "Remote job status");
        Ok(status)
    }

    pub fn local_job_status(&self, pid: &str) -> ServiceResult<LocalJobState> {
        let pid: u32 = pid.trim().parse().map_err(|_| JobError::InvalidPid {
            pid: pid.to_string(),
        })?;
        Ok(self.local_jobs.status(pid))
    }

    pub fn index_status(&self, index_name: &str) -> ServiceResult<Option<IngestionStatus>> {
        self.index_directory(index_name)?;
        self.db.get_ingestion_status(index_name)
    }

    pub fn set_index_status(&self, index_name: &str, status: &str) -> ServiceResult<IngestionStatus> {
        self.index_directory(index_name)?;
        info!(index = %index_name, status = %status, "Updating ingestion status");
        self.db.update_ingestion_status(index_name, |record| {
            record.status = Some(status.to_string());
        })
    }

    pub fn clear_index_status(&self, index_name: &str) -> ServiceResult<()> {
        self.index_directory(index_name)?;
        if self.db.clear_ingestion_status(index_name)? {
            info!(index = %index_name, "Cleared ingestion status");
        }
        Ok(())
    }
}
