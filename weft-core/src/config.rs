//! Engine configuration and the diagnostics sink.
//!
//! Like the rest of the engine state, configuration is thread-local: every
//! thread observes its own graph, so each thread (and each test) configures
//! its engine independently. [`crate::reactive::Runtime::reset`] restores the
//! defaults.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ReactiveError;

/// How a map write behaves when both the raw and the wrapped form of the same
/// object are present as distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasPolicy {
    /// Report the aliasing and let the write proceed; both entries stay.
    #[default]
    Warn,
    /// Report the aliasing and refuse the write.
    Reject,
}

/// Tunables for the thread's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactiveConfig {
    /// Emit developer diagnostics. Defaults to on in debug builds.
    pub dev_warnings: bool,
    /// Behaviour of aliasing map writes.
    pub alias_policy: AliasPolicy,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            dev_warnings: cfg!(debug_assertions),
            alias_policy: AliasPolicy::default(),
        }
    }
}

type DiagnosticHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static CONFIG: RefCell<ReactiveConfig> = RefCell::new(ReactiveConfig::default());
    static HANDLER: RefCell<Option<DiagnosticHandler>> = const { RefCell::new(None) };
}

/// Snapshot of the current configuration.
pub fn current() -> ReactiveConfig {
    CONFIG.with(|config| config.borrow().clone())
}

/// Modify the current configuration in place.
pub fn configure(f: impl FnOnce(&mut ReactiveConfig)) {
    CONFIG.with(|config| f(&mut config.borrow_mut()));
}

/// Route diagnostics to `handler` instead of the `tracing` sink.
pub fn set_diagnostic_handler(handler: impl Fn(&ReactiveError) + 'static) {
    HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Restore the default `tracing` sink.
pub fn clear_diagnostic_handler() {
    HANDLER.with(|slot| slot.borrow_mut().take());
}

pub(crate) fn reset() {
    CONFIG.with(|config| *config.borrow_mut() = ReactiveConfig::default());
    clear_diagnostic_handler();
}

/// Report a diagnostic. A no-op when `dev_warnings` is off.
pub fn report(err: ReactiveError) {
    if !current().dev_warnings {
        return;
    }

    // Clone the handler out so it may itself touch the configuration.
    let handler = HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&err),
        None => tracing::warn!(error = %err, "reactivity diagnostic"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handler_receives_reports() {
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        configure(|c| c.dev_warnings = true);
        set_diagnostic_handler(move |_| seen_clone.set(seen_clone.get() + 1));

        report(ReactiveError::NotObject { value: "1".into() });
        report(ReactiveError::NotObject { value: "2".into() });
        assert_eq!(seen.get(), 2);

        clear_diagnostic_handler();
    }

    #[test]
    fn reports_are_dropped_when_disabled() {
        let seen = Rc::new(Cell::new(false));
        let seen_clone = seen.clone();
        configure(|c| c.dev_warnings = false);
        set_diagnostic_handler(move |_| seen_clone.set(true));

        report(ReactiveError::NotObject { value: "1".into() });
        assert!(!seen.get());

        reset();
        assert_eq!(current(), ReactiveConfig::default());
    }
}
