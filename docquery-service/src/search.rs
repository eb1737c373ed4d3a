//! Search collaborator interface.
//!
//! The stream coordinator only knows the [`SearchEngine`] trait: a blocking
//! call that reports progress through [`crate::progress::report_progress`]
//! and returns a [`SearchOutput`].

use std::path::PathBuf;

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};

mod local;

pub use local::LocalSearchEngine;

/// One turn of prior conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Search request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub top: usize,
    pub approx_tag_limit: usize,
    pub conversation_history: Vec<HistoryMessage>,
    pub user_id: String,
    pub computation_approach: String,
    pub computation_decision: String,
    pub vision_support: bool,
    /// Include the index's master document in the candidate set
    pub include_master_py: bool,
    pub vector_type: String,
    pub index_name: String,
    pub full_search_output: bool,
    pub count: bool,
    pub token_limit: usize,
    pub temperature: f32,
    pub verbose: bool,
}

impl SearchParams {
    /// Checks beyond what deserialization already enforces
    pub fn validate(&self) -> ServiceResult<()> {
        if self.query.trim().is_empty() {
            return Err(validation_error("query", "must not be empty"));
        }
        if self.top == 0 {
            return Err(validation_error("top", "must be at least 1"));
        }
        if !self.temperature.is_finite() {
            return Err(validation_error("temperature", "must be a finite number"));
        }
        if !is_safe_segment(&self.index_name) {
            return Err(validation_error(
                "index_name",
                "must be a single path segment",
            ));
        }
        Ok(())
    }
}

fn validation_error(field: &str, problem: &str) -> ServiceError {
    ServiceError::Validation {
        message: format!("{field} {problem}"),
        details: Some(serde_json::json!([{ "loc": ["body", field], "msg": problem }])),
    }
}

/// True when `name` can be joined onto a directory without escaping it
pub fn is_safe_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// Result of a search. Payload shapes besides `answer` belong to the engine.
///
/// Serializes as `[answer, references, artifact, search_results, files]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutput {
    pub answer: String,
    pub references: serde_json::Value,
    /// Path of an output file written by the search, or null
    pub artifact: serde_json::Value,
    pub search_results: serde_json::Value,
    pub files: serde_json::Value,
}

impl Serialize for SearchOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&self.answer)?;
        tuple.serialize_element(&self.references)?;
        tuple.serialize_element(&self.artifact)?;
        tuple.serialize_element(&self.search_results)?;
        tuple.serialize_element(&self.files)?;
        tuple.end()
    }
}

/// Per-request environment handed to the engine
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub vector_directory: PathBuf,
    cancel: CancellationToken,
}

impl SearchContext {
    pub fn new(vector_directory: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            vector_directory,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Bail out if the client has gone away
    pub fn check_cancelled(&self) -> Result<(), SearchError> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Search failures. Reported in-band on the progress stream.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Index not found: {index_name}")]
    IndexNotFound { index_name: String },

    #[error("Search cancelled")]
    Cancelled,

    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write search output to {}", path.display())]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Failed { message: String },
}

/// A blocking search/answer backend.
///
/// Runs on a worker thread, never on the async executor.
pub trait SearchEngine: Send + Sync {
    fn search(
        &self,
        params: &SearchParams,
        ctx: &SearchContext,
    ) -> Result<SearchOutput, SearchError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_complete_params() {
        assert!(test_support::params("revenue by quarter").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_query() {
        let err = test_support::params("   ").validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_top() {
        let mut params = test_support::params("x");
        params.top = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_path_like_index() {
        let mut params = test_support::params("x");
        params.index_name = "../etc".to_string();
        assert!(params.validate().is_err());
        params.index_name = "a/b".to_string();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_reject_missing_query() {
        let body = r#"{"top": 5}"#;
        let err = serde_json::from_str::<SearchParams>(body).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }
}
