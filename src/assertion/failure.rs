//! Where assertion failures go.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

type FailHandler = Arc<dyn Fn(&str) + Send + Sync>;

thread_local! {
    /// Innermost capture scope last.
    static SCOPES: RefCell<Vec<Vec<String>>> = const { RefCell::new(Vec::new()) };
}

fn handler() -> &'static RwLock<Option<FailHandler>> {
    static HANDLER: OnceLock<RwLock<Option<FailHandler>>> = OnceLock::new();
    HANDLER.get_or_init(|| RwLock::new(None))
}

/// Install a process-wide handler for assertion failures.
///
/// Without a handler, a failure panics, which fails the enclosing test.
pub fn register_fail_handler<F>(f: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    *handler().write() = Some(Arc::new(f));
}

/// Go back to panicking on failure.
pub fn reset_fail_handler() {
    *handler().write() = None;
}

/// Run `f`, collecting the failures it reports on this thread instead of
/// reporting them.
///
/// Scopes nest; a failure lands in the innermost one. A panic inside `f`
/// closes the scope and keeps unwinding.
///
/// Scopes belong to the calling thread. A failure reported on another
/// thread is not captured and goes to the fail handler instead; this
/// includes `should_async` futures that resume on a different worker of a
/// multi-threaded runtime. Drive such futures on the calling thread, e.g.
/// with `futures::executor::block_on`, to capture their failures.
///
/// # Example
///
/// ```rust
/// use testkit_poll::matcher::equal;
/// use testkit_poll::{expect, intercept_failures};
///
/// let failures = intercept_failures(|| {
///     expect("foo").should(equal("bar"));
/// });
/// assert_eq!(failures.len(), 1);
/// assert!(failures[0].contains("to equal"));
/// ```
pub fn intercept_failures<F: FnOnce()>(f: F) -> Vec<String> {
    SCOPES.with(|scopes| scopes.borrow_mut().push(Vec::new()));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let captured = SCOPES
        .with(|scopes| scopes.borrow_mut().pop())
        .unwrap_or_default();
    if let Err(payload) = result {
        panic::resume_unwind(payload);
    }
    captured
}

/// Deliver one failure message.
#[track_caller]
pub(crate) fn report(message: String) {
    let message = SCOPES.with(|scopes| match scopes.borrow_mut().last_mut() {
        Some(scope) => {
            scope.push(message);
            None
        }
        None => Some(message),
    });
    let Some(message) = message else { return };

    let installed = handler().read().clone();
    match installed {
        Some(handler) => handler(&message),
        None => panic!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_intercept_collects_in_order() {
        let failures = intercept_failures(|| {
            report("first".to_string());
            report("second".to_string());
        });
        assert_eq!(failures, vec!["first", "second"]);
    }

    #[test]
    fn test_nested_scopes_capture_innermost() {
        let mut inner = Vec::new();
        let outer = intercept_failures(|| {
            report("outer".to_string());
            inner = intercept_failures(|| report("inner".to_string()));
        });
        assert_eq!(outer, vec!["outer"]);
        assert_eq!(inner, vec!["inner"]);
    }

    #[test]
    fn test_panic_closes_scope() {
        let result = panic::catch_unwind(|| {
            intercept_failures(|| panic!("boom"));
        });
        assert!(result.is_err());
        // The scope is gone, so this lands in a fresh one
        let failures = intercept_failures(|| report("after".to_string()));
        assert_eq!(failures, vec!["after"]);
    }

    #[test]
    #[serial]
    fn test_failures_on_other_threads_escape_scope() {
        static SEEN: Mutex<Vec<String>> = Mutex::new(Vec::new());
        register_fail_handler(|message| SEEN.lock().unwrap().push(message.to_string()));
        let failures = intercept_failures(|| {
            std::thread::spawn(|| report("elsewhere".to_string()))
                .join()
                .unwrap();
        });
        reset_fail_handler();
        assert!(failures.is_empty());
        assert_eq!(*SEEN.lock().unwrap(), vec!["elsewhere"]);
    }

    #[test]
    #[should_panic(expected = "unhandled failure")]
    #[serial]
    fn test_default_handler_panics() {
        report("unhandled failure".to_string());
    }

    #[test]
    #[serial]
    fn test_registered_handler() {
        static SEEN: Mutex<Vec<String>> = Mutex::new(Vec::new());
        register_fail_handler(|message| SEEN.lock().unwrap().push(message.to_string()));
        report("handled".to_string());
        reset_fail_handler();
        assert_eq!(*SEEN.lock().unwrap(), vec!["handled"]);
    }
}
