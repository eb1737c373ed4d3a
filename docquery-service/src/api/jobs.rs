//! Ingestion job API endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::jobs::{JobRequest, LocalJobState};

use super::AppState;

/// Submit an ingestion run to the remote job service; returns its job id
pub async fn submit_remote_job_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
    Json(request): Json<JobRequest>,
) -> Result<Json<String>, ServiceError> {
    let job_id = state
        .service
        .submit_remote_job(&index_name, request)
        .await?;
    Ok(Json(job_id))
}

/// Start the ingestion script locally; returns its PID
pub async fn submit_local_job_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
    Json(request): Json<JobRequest>,
) -> Result<Json<u32>, ServiceError> {
    Ok(Json(state.service.submit_local_job(&index_name, request)?))
}

pub async fn remote_job_status_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<String>, ServiceError> {
    Ok(Json(state.service.remote_job_status(&job_id).await?))
}

pub async fn local_job_status_handler(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
) -> Result<Json<LocalJobState>, ServiceError> {
    Ok(Json(state.service.local_job_status(&pid)?))
}
