//! Process-wide sink for errors nobody handles.
//!
//! Handler-less drains ([`subscribe_fn`](crate::seq::SequenceExt::subscribe_fn))
//! have no `on_error` channel; errors they hit are routed here instead of
//! vanishing. The default sink logs at error level. Installing a hook
//! replaces the default for the whole process; clearing it restores the
//! default.
//!
//! Cancellation never reaches the sink. A canceled drain is a deliberate
//! outcome, not a fault.

use crate::error::Error;
use parking_lot::RwLock;
use std::sync::Arc;

/// A replacement sink for unobserved errors.
pub type UnobservedHook = Arc<dyn Fn(&Error) + Send + Sync>;

static HOOK: RwLock<Option<UnobservedHook>> = RwLock::new(None);

/// Installs a process-wide hook receiving every unobserved error.
///
/// Replaces any previously installed hook.
pub fn set_unobserved_hook<F>(hook: F)
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    *HOOK.write() = Some(Arc::new(hook));
}

/// Removes the installed hook, restoring the default logging sink.
pub fn clear_unobserved_hook() {
    *HOOK.write() = None;
}

/// Routes an error to the current sink. Cancellation is suppressed.
pub(crate) fn report(error: &Error) {
    if error.is_canceled() {
        return;
    }
    let hook = HOOK.read().clone();
    match hook {
        Some(hook) => hook(error),
        None => tracing::error!(%error, "unobserved sequence error"),
    }
}
