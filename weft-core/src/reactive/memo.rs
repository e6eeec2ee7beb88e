//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns the
//!    cached value.
//!
//! 3. When a dependency changes, the memo becomes dirty and tells its own
//!    dependents that it is *pending*: it might produce a new value.
//!
//! 4. On next access (by a reader, or by a pending dependent deciding
//!    whether to run), the memo recomputes. Only if the new value differs
//!    from the cached one are its dependents made dirty.
//!
//! # Why This Matters
//!
//! This "push-pull" approach avoids unnecessary work:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually read will recompute
//! - An effect downstream of a memo whose value did not change stays clean

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{run_tracked, Effect};
use super::runtime::{DebugEvent, DebugOp, TrackOp, TriggerOp};
use super::subscriber::DirtyLevel;
use crate::graph::dep::DepSlot;
use crate::value::{has_changed, Value};

struct MemoInner {
    /// Tracks the computation's reads; never scheduled.
    effect: Effect,
    /// The computation. Receives the previous value (`Undefined` at first).
    compute: Box<dyn Fn(&Value) -> Value>,
    /// The cached value (None if never computed).
    value: RefCell<Option<Value>>,
    /// Readers of this memo.
    dependents: DepSlot,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// A memo is a readonly reactive cell: views store it like any other value
/// and unwrap it on read.
#[derive(Clone)]
pub struct Memo(Rc<MemoInner>);

impl Memo {
    /// Create a memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F, V>(compute: F) -> Self
    where
        F: Fn() -> V + 'static,
        V: Into<Value>,
    {
        Self::with_previous(move |_| compute().into())
    }

    /// Like [`Memo::new`], but the computation also sees the value it
    /// produced last time.
    pub fn with_previous<F>(compute: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self(Rc::new_cyclic(|weak: &Weak<MemoInner>| MemoInner {
            effect: Effect::detached(WeakMemo(weak.clone())),
            compute: Box::new(compute),
            value: RefCell::new(None),
            dependents: DepSlot::new(Some(WeakMemo(weak.clone()))),
        }))
    }

    /// Get the current value, recomputing if necessary, and record the read.
    pub fn get(&self) -> Value {
        self.refresh();
        self.0
            .dependents
            .track(|| DebugEvent::cell(DebugOp::Track(TrackOp::Get)));
        self.cached()
    }

    /// Get the current value without recording the read.
    pub fn get_untracked(&self) -> Value {
        self.refresh();
        self.cached()
    }

    fn cached(&self) -> Value {
        self.0.value.borrow().clone().unwrap_or_default()
    }

    /// Recompute if the cached value may be stale. Dependents are made
    /// dirty only when the value actually changed.
    pub(crate) fn refresh(&self) {
        let inner = &self.0;
        let has_value = inner.value.borrow().is_some();
        if has_value && !inner.effect.is_dirty() {
            return;
        }
        let previous = self.cached();
        let next = run_tracked(&inner.effect, || (inner.compute)(&previous));
        let changed = !has_value || has_changed(&next, &previous);
        let replaced = inner.value.replace(Some(next));
        drop(replaced);
        if changed {
            self.notify_dependents(DirtyLevel::Dirty);
        }
    }

    pub(crate) fn notify_dependents(&self, level: DirtyLevel) {
        self.0
            .dependents
            .notify(level, Some(&DebugEvent::cell(DebugOp::Trigger(TriggerOp::Set))));
    }

    /// Get the current dirty state.
    pub fn state(&self) -> DirtyLevel {
        self.0.effect.dirty_level()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        self.0.dependents.subscriber_count()
    }

    /// Stop tracking; the memo keeps its last value.
    pub fn dispose(&self) {
        self.0.effect.dispose();
    }

    pub fn ptr_eq(&self, other: &Memo) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

/// Non-owning handle to a memo, held by its effect and its Dep.
#[derive(Clone)]
pub(crate) struct WeakMemo(Weak<MemoInner>);

impl WeakMemo {
    pub(crate) fn upgrade(&self) -> Option<Memo> {
        self.0.upgrade().map(Memo)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("state", &self.state())
            .field("value", &*self.0.value.borrow())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
