//! Client for the remote ingestion job service.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::IngestionParams;
use crate::config::RemoteJobConfig;
use crate::error::JobError;

#[derive(Serialize)]
struct SubmitJobRequest<'a> {
    script: &'a str,
    params: &'a IngestionParams,
}

#[derive(Deserialize)]
struct SubmitJobResponse {
    id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
}

/// Remote job service API client
pub struct RemoteJobClient {
    client: Client,
    config: RemoteJobConfig,
}

impl RemoteJobClient {
    pub fn new(config: RemoteJobConfig) -> Result<Self, JobError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| JobError::Connection {
                url: config.base_url.clone().unwrap_or_default(),
                source: e,
            })?;

        Ok(Self { client, config })
    }

    pub fn enabled(&self) -> bool {
        self.config.base_url.is_some()
    }

    /// Submit an ingestion run, returning the service's job id
    pub async fn submit(&self, params: &IngestionParams) -> Result<String, JobError> {
        let url = self.jobs_url(None)?;
        debug!(url = %url, index = %params.request.index_name, "Submitting remote ingestion job");

        let response = self
            .client
            .post(url.clone())
            .json(&SubmitJobRequest {
                script: &self.config.script,
                params,
            })
            .send()
            .await
            .map_err(|e| JobError::Connection {
                url: url.to_string(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let body: SubmitJobResponse = response
            .json()
            .await
            .map_err(|source| JobError::InvalidResponse { source })?;

        info!(job_id = %body.id, "Remote ingestion job submitted");
        Ok(body.id)
    }

    /// Fetch the service's status string for a job
    pub async fn status(&self, job_id: &str) -> Result<String, JobError> {
        let url = self.jobs_url(Some(job_id))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| JobError::Connection {
                url: url.to_string(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let body: JobStatusResponse = response
            .json()
            .await
            .map_err(|source| JobError::InvalidResponse { source })?;

        Ok(body.status)
    }

    /// `{base_url}/jobs[/{job_id}]` with the id percent-encoded
    fn jobs_url(&self, job_id: Option<&str>) -> Result<Url, JobError> {
        let base = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| JobError::RunnerNotConfigured {
                runner: "remote".to_string(),
            })?;
        let invalid = || JobError::InvalidBaseUrl {
            url: base.to_string(),
        };

        let mut url = Url::parse(base).map_err(|_| invalid())?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| invalid())?;
            segments.pop_if_empty().push("jobs");
            if let Some(id) = job_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, JobError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(JobError::Rejected { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::test_support::ingestion_params;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    async fn fake_job_service() -> String {
        let app = Router::new()
            .route(
                "/api/jobs",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["script"], "ingest_doc.py");
                    assert_eq!(body["params"]["index_name"], "reports");
                    Json(json!({"id": "run-42"}))
                }),
            )
            .route(
                "/api/jobs/{id}",
                get(|Path(id): Path<String>| async move {
                    if id == "run 42" {
                        Ok(Json(json!({"status": "Running"})))
                    } else {
                        Err((StatusCode::NOT_FOUND, "no such job"))
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/")
    }

    fn client(base_url: Option<String>) -> RemoteJobClient {
        RemoteJobClient::new(RemoteJobConfig {
            base_url,
            ..RemoteJobConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let client = client(Some(fake_job_service().await));

        let id = client.submit(&ingestion_params("reports")).await.unwrap();
        assert_eq!(id, "run-42");

        assert_eq!(client.status("run 42").await.unwrap(), "Running");
    }

    #[tokio::test]
    async fn test_unknown_job_is_rejected() {
        let client = client(Some(fake_job_service().await));
        let err = client.status("missing").await.unwrap_err();
        assert!(matches!(err, JobError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = client(None);
        assert!(!client.enabled());
        let err = client.status("run-1").await.unwrap_err();
        assert!(matches!(err, JobError::RunnerNotConfigured { .. }));
    }
}
