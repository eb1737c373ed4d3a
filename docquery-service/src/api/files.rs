//! Asset file API endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ServiceError;

use super::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Text,
    Binary,
}

/// Asset query parameters
#[derive(Deserialize)]
pub struct AssetQuery {
    pub asset_path: String,
    #[serde(default)]
    pub format: FileFormat,
}

#[derive(Deserialize)]
pub struct AssetExistsQuery {
    pub asset_path: String,
}

/// Return an asset's contents as text or raw bytes
pub async fn get_file_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetQuery>,
) -> Result<Response, ServiceError> {
    let response = match query.format {
        FileFormat::Text => {
            let text = state.service.read_asset_text(&query.asset_path)?;
            ([(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())], text).into_response()
        }
        FileFormat::Binary => {
            let bytes = state.service.read_asset_bytes(&query.asset_path)?;
            (
                [(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())],
                bytes,
            )
                .into_response()
        }
    };
    Ok(response)
}

pub async fn file_exists_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetExistsQuery>,
) -> Result<Json<bool>, ServiceError> {
    Ok(Json(state.service.asset_exists(&query.asset_path)?))
}

pub async fn processing_plan_handler(
    State(state): State<Arc<AppState>>,
) -> Result<String, ServiceError> {
    state.service.read_processing_plan()
}
