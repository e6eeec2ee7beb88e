//! Signal Implementation
//!
//! A Signal is a single reactive value. It tracks which computations read it
//! and notifies them when it is written.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified. Writes of
//!    a value that is the same as the current one are ignored.
//!
//! 3. A signal holding a container stores the raw container and hands out a
//!    reactive view of it, so nested reads are tracked too. A shallow signal
//!    stores and returns exactly what it was given.
//!
//! Signals and memos are both *cells*: containers store them as values and
//! views unwrap them on read (see [`ReactiveCell`]).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::memo::Memo;
use super::runtime::{DebugEvent, DebugOp, TrackOp, TriggerOp};
use super::subscriber::DirtyLevel;
use crate::config;
use crate::error::ReactiveError;
use crate::graph::dep::DepSlot;
use crate::proxy;
use crate::value::{has_changed, Value};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

struct SignalInner {
    id: u64,
    /// What was written, with views unwrapped.
    raw: RefCell<Value>,
    /// What readers get.
    value: RefCell<Value>,
    shallow: bool,
    subscribers: DepSlot,
}

/// A reactive cell holding one [`Value`].
///
/// # Example
///
/// ```rust
/// use weft_core::{Signal, Value};
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), Value::from(5));
/// ```
#[derive(Clone)]
pub struct Signal(Rc<SignalInner>);

impl Signal {
    /// Create a signal. Containers are stored raw and read back as reactive
    /// views.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::build(proxy::to_raw(&value), proxy::to_reactive(value), false)
    }

    /// Create a signal that stores and returns values as given.
    pub fn shallow(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::build(value.clone(), value, true)
    }

    fn build(raw: Value, value: Value, shallow: bool) -> Self {
        Self(Rc::new(SignalInner {
            id: SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            shallow,
            subscribers: DepSlot::new(None),
        }))
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> Value {
        self.0
            .subscribers
            .track(|| DebugEvent::cell(DebugOp::Track(TrackOp::Get)));
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Set a new value and notify subscribers if it changed.
    ///
    /// Readonly and shallow views are stored as given; other views are
    /// unwrapped to their raw target first.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let direct = self.0.shallow || proxy::is_shallow(&value) || proxy::is_readonly(&value);
        let raw = if direct { value.clone() } else { proxy::to_raw(&value) };
        let old = self.0.raw.borrow().clone();
        if !has_changed(&raw, &old) {
            return;
        }
        let stored = if direct { value } else { proxy::to_reactive(raw.clone()) };
        let old_raw = self.0.raw.replace(raw.clone());
        let old_value = self.0.value.replace(stored);
        drop((old_raw, old_value));

        let event = DebugEvent {
            new_value: Some(raw),
            old_value: Some(old),
            ..DebugEvent::cell(DebugOp::Trigger(TriggerOp::Set))
        };
        self.0.subscribers.notify(DirtyLevel::Dirty, Some(&event));
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Notify subscribers without changing the value, for example after
    /// mutating a shallow signal's container in place.
    pub fn notify(&self) {
        let event = DebugEvent {
            new_value: Some(self.get_untracked()),
            ..DebugEvent::cell(DebugOp::Trigger(TriggerOp::Set))
        };
        self.0.subscribers.notify(DirtyLevel::Dirty, Some(&event));
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.subscriber_count()
    }

    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.0.id)
            .field("value", &*self.0.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A single-value reactive cell: a writable [`Signal`] or a readonly
/// [`Memo`].
#[derive(Clone, Debug)]
pub enum ReactiveCell {
    Signal(Signal),
    Memo(Memo),
}

impl ReactiveCell {
    /// Read the cell, recording the read.
    pub fn get(&self) -> Value {
        match self {
            ReactiveCell::Signal(signal) => signal.get(),
            ReactiveCell::Memo(memo) => memo.get(),
        }
    }

    pub fn get_untracked(&self) -> Value {
        match self {
            ReactiveCell::Signal(signal) => signal.get_untracked(),
            ReactiveCell::Memo(memo) => memo.get_untracked(),
        }
    }

    /// Write the cell. Memos are readonly: the write is reported and
    /// refused.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        match self {
            ReactiveCell::Signal(signal) => {
                signal.set(value);
                true
            }
            ReactiveCell::Memo(_) => {
                config::report(ReactiveError::ReadonlyCell {
                    key: "value".to_string(),
                });
                false
            }
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self, ReactiveCell::Memo(_))
    }

    pub fn is_shallow(&self) -> bool {
        matches!(self, ReactiveCell::Signal(signal) if signal.is_shallow())
    }

    pub fn ptr_eq(&self, other: &ReactiveCell) -> bool {
        match (self, other) {
            (ReactiveCell::Signal(a), ReactiveCell::Signal(b)) => a.ptr_eq(b),
            (ReactiveCell::Memo(a), ReactiveCell::Memo(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Address used to hash cells by identity.
    pub(crate) fn addr(&self) -> usize {
        match self {
            ReactiveCell::Signal(signal) => Rc::as_ptr(&signal.0) as *const () as usize,
            ReactiveCell::Memo(memo) => memo.addr(),
        }
    }
}

/// Whether `value` is a reactive cell.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Cell(_))
}

/// The value of a cell (recording the read), or `value` itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Cell(cell) => cell.get(),
        other => other.clone(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
