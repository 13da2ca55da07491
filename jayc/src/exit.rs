//! Process-wide exit hook (spec.md §4.G).
//!
//! A single `{handler, ctx}` pair invoked immediately before the process
//! exits. [`crate::log::Logger::log`] calls [`exit`] when handed
//! [`crate::log::Level::Fatal`]; callers may also invoke it directly.

use std::process;
use std::sync::OnceLock;

use parking_lot::Mutex;

type Hook = Box<dyn Fn(i32) + Send + Sync>;

static HOOK: OnceLock<Mutex<Option<Hook>>> = OnceLock::new();

fn hook_slot() -> &'static Mutex<Option<Hook>> {
    HOOK.get_or_init(|| Mutex::new(None))
}

/// Install the process-wide exit hook, replacing any previously installed
/// one. The hook runs synchronously, on the calling thread, immediately
/// before [`exit`] calls `std::process::exit`.
pub fn set_hook<F>(hook: F)
where
    F: Fn(i32) + Send + Sync + 'static,
{
    *hook_slot().lock() = Some(Box::new(hook));
}

/// Remove any installed exit hook.
pub fn clear_hook() {
    *hook_slot().lock() = None;
}

/// Run the installed hook (if any) with `code`, then terminate the process.
///
/// Documented to never return, matching the C core's
/// `jlog_log_message(FATAL)` contract (spec.md §9).
pub fn exit(code: i32) -> ! {
    if let Some(hook) = hook_slot().lock().as_ref() {
        hook(code);
    }
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn hook_is_invoked_with_code() {
        let seen = Arc::new(AtomicI32::new(-1));
        let seen2 = seen.clone();
        set_hook(move |code| seen2.store(code, Ordering::SeqCst));

        // Exercise the hook directly rather than through `exit`, which
        // would terminate the test process.
        if let Some(hook) = hook_slot().lock().as_ref() {
            hook(7);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        clear_hook();
    }
}
