//! Thread-scoped redirection of progress reports.
//!
//! The hook lives in a thread-local slot, so two workers running on
//! different threads never see each other's binding. Blocking-pool threads
//! are reused across requests; the [`HookGuard`] restores the previous
//! binding when the worker is done.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::info;

/// Callback receiving `(message, detail)` for each progress report
pub type ProgressHook = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

thread_local! {
    static CURRENT_HOOK: RefCell<Option<ProgressHook>> = const { RefCell::new(None) };
}

/// Keeps a hook installed on the current thread until dropped
#[must_use = "the hook is removed as soon as the guard is dropped"]
pub struct HookGuard {
    previous: Option<ProgressHook>,
    // Tied to the thread it was installed on
    _not_send: PhantomData<*const ()>,
}

/// Bind `hook` to the current thread
pub fn install_hook(hook: ProgressHook) -> HookGuard {
    let previous = CURRENT_HOOK.with(|slot| slot.borrow_mut().replace(hook));
    HookGuard {
        previous,
        _not_send: PhantomData,
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_HOOK.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Report a progress step from inside a search.
///
/// Routed to the hook installed on this thread, or logged when there is none.
pub fn report_progress(message: &str, detail: Option<&str>) {
    // Clone out first so a hook may itself report without a double borrow
    let hook = CURRENT_HOOK.with(|slot| slot.borrow().clone());
    match hook {
        Some(hook) => hook(message, detail),
        None => info!(step = %message, detail = ?detail, "Search progress"),
    }
}
