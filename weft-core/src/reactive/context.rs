//! Reactive Context
//!
//! The reactive context tracks which computation is currently running, and
//! whether reads should be recorded as dependencies.
//!
//! # Implementation
//!
//! A thread-local stack holds the running computations. Running a
//! computation pushes it; the returned guard pops it. Nested computations
//! (a memo read inside an effect) push on top and restore the outer one when
//! they finish.
//!
//! Tracking can be paused independently with [`pause_tracking`]. The pause is
//! a depth counter. Entering a computation saves the depth and clears it, so a
//! computation started from inside a paused region still tracks its own
//! reads; the saved depth is restored when the computation finishes.

use std::cell::{Cell, RefCell};

use super::effect::Effect;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static TRACK_PAUSE: Cell<usize> = const { Cell::new(0) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    effect: Effect,
    /// Tracking pause depth in force when the computation was entered.
    saved_pause: usize,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Make `effect` the active computation until the guard drops.
    pub(crate) fn enter(effect: &Effect) -> Self {
        let saved_pause = TRACK_PAUSE.with(|pause| pause.replace(0));
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                effect: effect.clone(),
                saved_pause,
            });
        });

        Self {
            subscriber_id: effect.id(),
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.effect.id()))
    }

    pub(crate) fn active_effect() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.effect.clone()))
    }

    /// Whether a read right now would be recorded.
    pub fn should_track() -> bool {
        TRACK_PAUSE.with(Cell::get) == 0 && Self::is_active()
    }

    pub(crate) fn reset() {
        let drained = CONTEXT_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
        drop(drained);
        TRACK_PAUSE.with(|pause| pause.set(0));
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.effect.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.effect.id()
            );
            TRACK_PAUSE.with(|pause| pause.set(entry.saved_pause));
        }
    }
}

/// Stop recording reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    TRACK_PAUSE.with(|pause| pause.set(pause.get() + 1));
}

/// Undo one [`pause_tracking`].
pub fn reset_tracking() {
    TRACK_PAUSE.with(|pause| pause.set(pause.get().saturating_sub(1)));
}

/// Whether tracking is currently paused.
pub fn is_tracking_paused() -> bool {
    TRACK_PAUSE.with(Cell::get) > 0
}

/// Guard that pauses tracking until dropped.
pub struct TrackingPause {
    _private: (),
}

impl TrackingPause {
    pub fn new() -> Self {
        pause_tracking();
        Self { _private: () }
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}
