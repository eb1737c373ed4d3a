//! Stream coordinator: binds one search request to one worker thread and
//! one progress channel.
//!
//! The engine is blocking, so it runs on the blocking thread pool while the
//! response body drains the channel on the async executor. Every worker exit
//! path, panics included, pushes exactly one `Result` or `Error` followed by
//! exactly one `End`.

use std::any::Any;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::DocQueryService;
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::progress::{
    self, ProgressEvent, ProgressHook, ProgressReceiver, ProgressSender, install_hook,
};
use crate::search::{SearchContext, SearchEngine, SearchOutput, SearchParams};

/// Live view of one running search
pub struct SearchStream {
    request_id: Uuid,
    receiver: ProgressReceiver,
    finished: bool,
    // Cancels the worker's token when the response body is dropped
    _cancel_on_drop: DropGuard,
}

impl SearchStream {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Next payload event, or `None` once the worker has pushed `End`
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.pull().await {
            ProgressEvent::End => {
                self.finished = true;
                debug!(request_id = %self.request_id, "Search stream finished");
                None
            }
            event => Some(event),
        }
    }

    /// Response body: one JSON line per event, ending at `End`
    pub fn into_ndjson(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        async_stream::stream! {
            let mut stream = self;
            while let Some(event) = stream.next_event().await {
                match event.to_ndjson_line() {
                    Ok(line) => yield Ok(line),
                    Err(e) => {
                        error!(request_id = %stream.request_id, error = %e, "Failed to encode progress event");
                        if event.is_terminal()
                            && let Ok(line) = ProgressEvent::Error(e.to_string()).to_ndjson_line()
                        {
                            yield Ok(line);
                        }
                    }
                }
            }
        }
    }
}

impl Drop for SearchStream {
    fn drop(&mut self) {
        if !self.finished {
            info!(request_id = %self.request_id, "Client went away before search finished, cancelling");
        }
    }
}

/// Output of the synchronous search endpoint
#[derive(Debug)]
pub struct LegacySearchResult {
    pub output: SearchOutput,
    pub steps: Vec<(String, Option<String>)>,
}

impl DocQueryService {
    /// Start a search on the blocking pool and return its progress stream
    /// immediately. `params` must already be validated.
    pub fn start_search_stream(&self, params: SearchParams) -> ServiceResult<SearchStream> {
        let vector_directory = self.index_directory(&params.index_name)?;
        let request_id = Uuid::new_v4();
        let (sender, receiver) = progress::channel();
        let cancel = CancellationToken::new();
        let ctx = SearchContext::new(vector_directory, cancel.clone());
        let engine = self.engine.clone();

        info!(
            request_id = %request_id,
            index = %params.index_name,
            user_id = %params.user_id,
            top = params.top,
            "Starting streaming search"
        );

        let span = info_span!("search_worker", request_id = %request_id);
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            run_worker(engine.as_ref(), &params, &ctx, sender);
        });

        Ok(SearchStream {
            request_id,
            receiver,
            finished: false,
            _cancel_on_drop: cancel.drop_guard(),
        })
    }

    /// Run a search to completion and collect its steps.
    ///
    /// Still runs the engine on the blocking pool; only the caller waits.
    pub async fn run_search(&self, params: SearchParams) -> ServiceResult<LegacySearchResult> {
        let vector_directory = self.index_directory(&params.index_name)?;
        let ctx = SearchContext::new(vector_directory, CancellationToken::new());
        let engine = self.engine.clone();
        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = steps.clone();

        info!(index = %params.index_name, user_id = %params.user_id, "Running search");

        let outcome = tokio::task::spawn_blocking(move || {
            let hook: ProgressHook = Arc::new(move |message: &str, detail: Option<&str>| {
                sink.lock()
                    .unwrap()
                    .push((message.to_string(), detail.map(str::to_string)));
            });
            let _hook = install_hook(hook);
            engine.search(&params, &ctx)
        })
        .instrument(info_span!("search"))
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("search worker failed: {e}"),
        })?;

        let output = outcome?;
        let steps = std::mem::take(&mut *steps.lock().unwrap());
        Ok(LegacySearchResult { output, steps })
    }
}

/// Run one search on the current thread, translating its outcome into
/// progress events on `sender`.
pub(crate) fn run_worker(
    engine: &dyn SearchEngine,
    params: &SearchParams,
    ctx: &SearchContext,
    sender: ProgressSender,
) {
    // Declared first so its drop (which pushes `End`) runs last
    let mut completion = Completion::new(sender.clone());

    let hook: ProgressHook = Arc::new(move |message: &str, detail: Option<&str>| {
        sender.push(ProgressEvent::step(message, detail))
    });
    let hook_guard = install_hook(hook);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.search(params, ctx)));
    drop(hook_guard);

    match outcome {
        Ok(Ok(output)) => {
            info!(index = %params.index_name, "Search completed");
            completion.finish(ProgressEvent::Result(output));
        }
        Ok(Err(e)) => {
            let message = format_error_chain(&e);
            warn!(index = %params.index_name, error = %message, "Search failed");
            completion.finish(ProgressEvent::Error(message));
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(index = %params.index_name, panic = %message, "Search worker panicked");
            completion.finish(ProgressEvent::Error(format!(
                "search worker panicked: {message}"
            )));
        }
    }
}

/// Guarantees the terminal event and `End` reach the channel
struct Completion {
    sender: ProgressSender,
    terminal_sent: bool,
}

impl Completion {
    fn new(sender: ProgressSender) -> Self {
        Self {
            sender,
            terminal_sent: false,
        }
    }

    fn finish(&mut self, event: ProgressEvent) {
        debug_assert!(event.is_terminal());
        if !self.terminal_sent {
            self.sender.push(event);
            self.terminal_sent = true;
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.terminal_sent {
            self.sender.push(ProgressEvent::Error(
                "search worker terminated unexpectedly".to_string(),
            ));
        }
        self.sender.push(ProgressEvent::End);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
