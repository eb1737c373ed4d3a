//! Per-request progress delivery.
//!
//! A blocking search worker reports progress through [`report_progress`].
//! The stream coordinator binds those reports to a request-scoped
//! [`ProgressSender`] with [`install_hook`], and the HTTP response drains the
//! matching [`ProgressReceiver`] until [`ProgressEvent::End`].

mod channel;
mod hook;
pub mod messages;

pub use channel::{ProgressReceiver, ProgressSender, channel};
pub use hook::{ProgressHook, install_hook, report_progress};
pub use messages::ProgressEvent;
