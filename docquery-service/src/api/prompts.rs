//! Prompt API endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ServiceError;

use super::AppState;

/// List all prompt documents
pub async fn list_prompts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Value>>, ServiceError> {
    Ok(Json(state.service.list_prompts()?))
}

/// Create a prompt; its `id` must be new
pub async fn create_prompt_handler(
    State(state): State<Arc<AppState>>,
    Json(prompt): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let prompt = state.service.create_prompt(prompt)?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

/// Create or replace a prompt
pub async fn upsert_prompt_handler(
    State(state): State<Arc<AppState>>,
    Json(prompt): Json<Value>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(state.service.upsert_prompt(prompt)?))
}

pub async fn delete_prompt_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.service.delete_prompt(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Latest versioned prompt text from the prompts directory
pub async fn get_prompt_text_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<String, ServiceError> {
    state.service.latest_prompt_text(&id)
}
