//! Index API endpoints.
//!
//! Handlers for index listing, uploads, ingestion status, processing plans
//! and ingestion logs.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::db::IngestionStatus;
use crate::error::ServiceError;
use crate::service::IndexDocument;

use super::AppState;

/// Request to set an index's ingestion status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn list_indexes_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ServiceError> {
    Ok(Json(state.service.list_indexes()?))
}

/// Files already uploaded for ingestion
pub async fn list_files_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<Json<Vec<String>>, ServiceError> {
    Ok(Json(state.service.list_download_files(&index_name)?))
}

/// Upload one or more files into the index's download directory
pub async fn upload_files_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Vec<String>>, ServiceError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest {
            message: e.body_text(),
        })?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!(field = ?field.name(), "Ignoring multipart field without a file name");
            continue;
        };
        let data = field.bytes().await.map_err(|e| ServiceError::InvalidRequest {
            message: e.body_text(),
        })?;
        files.push((filename, data));
    }

    if files.is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "No files provided".to_string(),
        });
    }

    Ok(Json(state.service.save_uploads(&index_name, files)?))
}

/// Documents stored for an index, or `null` if it does not exist
pub async fn index_documents_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<Json<Option<Vec<IndexDocument>>>, ServiceError> {
    Ok(Json(state.service.index_documents(&index_name)?))
}

pub async fn get_status_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<Json<Option<IngestionStatus>>, ServiceError> {
    Ok(Json(state.service.index_status(&index_name)?))
}

pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<IngestionStatus>, ServiceError> {
    Ok(Json(
        state.service.set_index_status(&index_name, &request.status)?,
    ))
}

pub async fn clear_status_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.service.clear_index_status(&index_name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Copy the processing plan into the index directory
pub async fn copy_plan_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.service.copy_processing_plan(&index_name)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_log_handler(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(state.service.index_log(&index_name)?))
}
