//! Unbounded FIFO between one worker and one response stream.

use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::ProgressEvent;

/// Create a fresh progress channel for one request
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Worker side of a progress channel. Usable from any thread.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Enqueue without blocking. Events pushed after the response stream
    /// went away are dropped.
    pub fn push(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            trace!("Progress receiver gone, discarding event");
        }
    }
}

/// Response side of a progress channel
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Wait for the next event.
    ///
    /// If every sender is gone without an `End`, yields `End` so the
    /// consumer still terminates.
    pub async fn pull(&mut self) -> ProgressEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => {
                warn!("Progress channel closed without an end marker");
                ProgressEvent::End
            }
        }
    }
}
