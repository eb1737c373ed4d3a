use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Prompt not found: {prompt_id}")]
    PromptNotFound { prompt_id: String },

    #[error("Prompt already exists: {prompt_id}")]
    PromptAlreadyExists { prompt_id: String },

    #[error("Log not found for index: {index_name}")]
    LogNotFound { index_name: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Request validation failed: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Job error")]
    Job(#[from] JobError),

    #[error("Search failed")]
    Search(#[from] crate::search::SearchError),

    #[error("Storage error at {}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Ingestion job errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job runner not configured: {runner}")]
    RunnerNotConfigured { runner: String },

    #[error("Failed to spawn local job `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job service URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("Invalid process id: {pid}")]
    InvalidPid { pid: String },

    #[error("Connection failed to job service at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Job service rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from job service")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to encode ingestion parameters")]
    Encode(#[source] serde_json::Error),
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::PromptNotFound { .. }
            | ServiceError::LogNotFound { .. }
            | ServiceError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::PromptAlreadyExists { .. } => StatusCode::CONFLICT,
            ServiceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Job(JobError::RunnerNotConfigured { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Job(JobError::InvalidPid { .. }) => StatusCode::BAD_REQUEST,
            ServiceError::Job(
                JobError::Connection { .. }
                | JobError::Rejected { .. }
                | JobError::InvalidResponse { .. },
            ) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::PromptNotFound { .. } => "prompt_not_found",
            ServiceError::PromptAlreadyExists { .. } => "prompt_already_exists",
            ServiceError::LogNotFound { .. } => "log_not_found",
            ServiceError::FileNotFound { .. } => "file_not_found",
            ServiceError::Validation { .. } => "validation_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Database(_) => "database_error",
            ServiceError::Job(JobError::RunnerNotConfigured { .. }) => "job_runner_not_configured",
            ServiceError::Job(JobError::Spawn { .. }) => "job_spawn_failed",
            ServiceError::Job(JobError::InvalidBaseUrl { .. }) => "job_service_url_invalid",
            ServiceError::Job(JobError::InvalidPid { .. }) => "invalid_pid",
            ServiceError::Job(JobError::Connection { .. }) => "job_service_connection",
            ServiceError::Job(JobError::Rejected { .. }) => "job_service_rejected",
            ServiceError::Job(JobError::InvalidResponse { .. }) => "job_service_invalid_response",
            ServiceError::Job(JobError::Encode(_)) => "job_encode_error",
            ServiceError::Search(_) => "search_error",
            ServiceError::Storage { .. } => "storage_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();
        let message = format_error_chain(&self);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = %code, error = %message, "Request failed");
        }

        let details = match self {
            ServiceError::Validation { details, .. } => details,
            _ => None,
        };

        let response = ErrorResponse {
            message,
            code: Some(code),
            details,
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and all of its sources as a single `a: b: c` line.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
