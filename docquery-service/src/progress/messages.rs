//! Progress event types and their ndjson encoding.

use bytes::Bytes;
use serde::Serialize;

use crate::search::SearchOutput;

/// Events carried from a search worker to the response writer.
///
/// Serialized with the kind as `kind` and the variant data as `payload`:
/// `{"kind":"STEP","payload":["ranking","3 candidates"]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEvent {
    /// A progress report: message and optional detail
    Step(String, Option<String>),
    /// Successful completion
    Result(SearchOutput),
    /// Worker failure, reported in-band
    Error(String),
    /// End of stream marker, never written to the response
    End,
}

impl ProgressEvent {
    pub fn step(message: impl Into<String>, detail: Option<&str>) -> Self {
        ProgressEvent::Step(message.into(), detail.map(str::to_string))
    }

    /// `Result` and `Error` close out a request's payload lines
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Result(_) | ProgressEvent::Error(_))
    }

    /// Encode as one newline-terminated JSON line
    pub fn to_ndjson_line(&self) -> serde_json::Result<Bytes> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}
