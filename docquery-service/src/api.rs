//! HTTP API for the docquery service.
//!
//! This module provides the REST API endpoints for:
//! - Health, models and job runner discovery
//! - Prompt management
//! - Streaming and synchronous search
//! - Index files, ingestion status and ingestion jobs

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::jobs::JobRunnerKind;
use crate::service::DocQueryService;

pub mod files;
pub mod indexes;
pub mod jobs;
pub mod prompts;
pub mod search;

/// Application state
pub struct AppState {
    pub service: Arc<DocQueryService>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<DocQueryService>) -> Router {
    // Uploads may carry several documents in one request
    let max_upload_bytes = service.config.storage.max_upload_bytes as usize;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/models", get(models_handler))
        .route("/job_runners", get(job_runners_handler))
        // Prompt endpoints
        .route(
            "/prompt",
            get(prompts::list_prompts_handler)
                .post(prompts::create_prompt_handler)
                .patch(prompts::upsert_prompt_handler),
        )
        .route(
            "/prompt/{id}",
            get(prompts::get_prompt_text_handler).delete(prompts::delete_prompt_handler),
        )
        // Search endpoints
        .route("/search-stream", post(search::search_stream_handler))
        .route("/search", post(search::search_handler))
        // Asset endpoints
        .route("/file", get(files::get_file_handler))
        .route("/file_exists", get(files::file_exists_handler))
        .route("/processing_plan", get(files::processing_plan_handler))
        // Index endpoints
        .route("/index", get(indexes::list_indexes_handler))
        .route(
            "/index/{index_name}/files",
            get(indexes::list_files_handler).post(indexes::upload_files_handler),
        )
        .route(
            "/index/{index_name}/documents",
            get(indexes::index_documents_handler),
        )
        .route(
            "/index/{index_name}/status",
            get(indexes::get_status_handler)
                .post(indexes::update_status_handler)
                .delete(indexes::clear_status_handler),
        )
        .route("/index/{index_name}/plan", post(indexes::copy_plan_handler))
        .route("/index/{index_name}/log", get(indexes::get_log_handler))
        // Job endpoints
        .route(
            "/index/{index_name}/remote_job",
            post(jobs::submit_remote_job_handler),
        )
        .route(
            "/index/{index_name}/local_job",
            post(jobs::submit_local_job_handler),
        )
        .route("/job/{job_id}", get(jobs::remote_job_status_handler))
        .route("/local_job/{pid}", get(jobs::local_job_status_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        job_runners: state.service.job_runners(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    job_runners: Vec<JobRunnerKind>,
}

// === Discovery ===

async fn models_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.service.models().to_vec())
}

async fn job_runners_handler(State(state): State<Arc<AppState>>) -> Json<Vec<JobRunnerKind>> {
    Json(state.service.job_runners())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::search::SearchEngine;
    use crate::service::test_support::service_with_engine;

    pub(crate) fn test_router(root: &std::path::Path, engine: Arc<dyn SearchEngine>) -> Router {
        router(Arc::new(service_with_engine(root, engine)))
    }

    /// Send a request and return the status and the raw body
    pub(crate) async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    pub(crate) async fn send_json(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::search::test_support::EchoEngine;
    use axum::http::StatusCode;
    use serde_json::json;

    fn app(dir: &std::path::Path) -> Router {
        test_router(dir, Arc::new(EchoEngine { steps: 0 }))
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send_json(&app(dir.path()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["job_runners"], json!([]));
    }

    #[tokio::test]
    async fn test_models_and_runners() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = send_json(&app, "GET", "/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["gpt-4o", "gpt-4-turbo"]));

        let (status, body) = send_json(&app, "GET", "/job_runners", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = send(&app(dir.path()), "GET", "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
