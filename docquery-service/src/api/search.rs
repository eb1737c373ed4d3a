//! Search API endpoints.
//!
//! `/search-stream` answers with newline-delimited JSON progress events as
//! the search runs. `/search` is the older synchronous form.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderName, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::search::SearchParams;

use super::AppState;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Decode and check a search body before any worker is started
fn parse_search_params(body: &[u8]) -> ServiceResult<SearchParams> {
    let params: SearchParams =
        serde_json::from_slice(body).map_err(|e| ServiceError::Validation {
            message: e.to_string(),
            details: Some(json!([{
                "loc": ["body"],
                "msg": e.to_string(),
                "line": e.line(),
                "column": e.column(),
            }])),
        })?;
    params.validate()?;
    Ok(params)
}

/// Stream search progress as ndjson
pub async fn search_stream_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let params = parse_search_params(&body)?;
    let stream = state.service.start_search_stream(params)?;
    let request_id = stream.request_id().to_string();

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (REQUEST_ID_HEADER, request_id),
        ],
        Body::from_stream(stream.into_ndjson()),
    )
        .into_response())
}

/// Run a search to completion.
///
/// Responds with `[answer, references, artifact, search_results, files, steps]`.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let params = parse_search_params(&body)?;
    let result = state.service.run_search(params).await?;
    let output = result.output;

    Ok(Json(json!([
        output.answer,
        output.references,
        output.artifact,
        output.search_results,
        output.files,
        result.steps,
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{send, send_json, test_router};
    use crate::search::SearchOutput;
    use crate::search::test_support::{Outcome, ScriptedEngine, params};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn scripted(outcome: Outcome) -> Arc<ScriptedEngine> {
        Arc::new(ScriptedEngine::new(
            &[("fetching", None), ("ranking", Some("3 candidates"))],
            outcome,
        ))
    }

    fn output() -> SearchOutput {
        SearchOutput {
            answer: "42".to_string(),
            references: json!(["a.txt"]),
            artifact: Value::Null,
            search_results: json!([]),
            files: json!([]),
        }
    }

    fn body(query: &str) -> Value {
        serde_json::to_value(params(query)).unwrap()
    }

    #[tokio::test]
    async fn test_stream_scenario_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted(Outcome::Succeed(output()));
        let app = test_router(dir.path(), engine.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/search-stream")
            .header("content-type", "application/json")
            .body(Body::from(body("x").to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            NDJSON_CONTENT_TYPE
        );
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            concat!(
                "{\"kind\":\"STEP\",\"payload\":[\"fetching\",null]}\n",
                "{\"kind\":\"STEP\",\"payload\":[\"ranking\",\"3 candidates\"]}\n",
                "{\"kind\":\"RESULT\",\"payload\":[\"42\",[\"a.txt\"],null,[],[]]}\n",
            )
        );
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_never_starts_search() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted(Outcome::Succeed(output()));
        let app = test_router(dir.path(), engine.clone());

        let (status, response) =
            send_json(&app, "POST", "/search-stream", Some(json!({"top": 5}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response["code"], "validation_error");
        assert!(response["details"].is_array());

        let request = Request::builder()
            .method("POST")
            .uri("/search-stream")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let mut blank = body("x");
        blank["query"] = json!("  ");
        let (status, _) = send(&app, "POST", "/search-stream", Some(blank)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_reports_failure_in_band() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path(), scripted(Outcome::Fail("no index".to_string())));

        let (status, bytes) = send(&app, "POST", "/search-stream", Some(body("x"))).await;

        assert_eq!(status, StatusCode::OK);
        let lines: Vec<Value> = std::str::from_utf8(&bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "STEP");
        assert_eq!(lines[1]["kind"], "STEP");
        assert_eq!(lines[2], json!({"kind": "ERROR", "payload": "no index"}));
    }

    #[tokio::test]
    async fn test_legacy_search() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path(), scripted(Outcome::Succeed(output())));

        let (status, response) = send_json(&app, "POST", "/search", Some(body("x"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response,
            json!([
                "42",
                ["a.txt"],
                null,
                [],
                [],
                [["fetching", null], ["ranking", "3 candidates"]]
            ])
        );
    }

    #[tokio::test]
    async fn test_legacy_search_failure_is_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path(), scripted(Outcome::Fail("no index".to_string())));

        let (status, response) = send_json(&app, "POST", "/search", Some(body("x"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response["code"], "search_error");
        assert_eq!(response["message"], "Search failed: no index");
    }
}
