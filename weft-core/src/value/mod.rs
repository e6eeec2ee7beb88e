//! Value Model
//!
//! Everything the engine observes is expressed as a [`Value`]: primitives,
//! raw containers ([`Target`]), wrapped views over containers
//! ([`crate::proxy::Reactive`]) and single-value reactive cells
//! ([`crate::reactive::ReactiveCell`]).
//!
//! # Equality
//!
//! Containers, views and cells compare by identity. Numbers compare
//! numerically across `Int` and `Float`. `Eq`/`Hash` follow SameValueZero
//! (NaN equals NaN, `+0` equals `-0`), which is what collection keys need.
//! Write suppression uses [`has_changed`] instead, which additionally keeps
//! `+0` and `-0` apart.

mod key;
mod target;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

pub use key::{Key, ReactiveFlag, MAX_ARRAY_LENGTH};
pub use target::{Target, TargetId, TargetKind};

use crate::proxy::Reactive;
use crate::reactive::{Memo, ReactiveCell, Signal};

/// A dynamically typed value flowing through observed object graphs.
#[derive(Clone, Default)]
pub enum Value {
    /// The value of a missing property or an array hole.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A raw, unobserved container.
    Object(Target),
    /// A wrapped view over a container.
    Reactive(Reactive),
    /// A single-value reactive cell.
    Cell(ReactiveCell),
}

impl Value {
    /// Whether this value is a container or a view over one.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of a number, if it has an exact one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => integral(*f),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(view) => Some(view),
            _ => None,
        }
    }

    /// Owned handle to the wrapped view, if this is one.
    pub fn view(&self) -> Option<Reactive> {
        self.as_reactive().cloned()
    }

    pub fn as_cell(&self) -> Option<&ReactiveCell> {
        match self {
            Value::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// The raw target behind a container or a view.
    pub fn target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Reactive(view) => Some(view.raw_target().clone()),
            _ => None,
        }
    }

    /// `Object.is`-style sameness: like `==` except NaN is the same as NaN
    /// and `+0` differs from `-0`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => match (a, b) {
                (Number::Int(a), Number::Int(b)) => a == b,
                (a, b) => {
                    let (a, b) = (a.as_f64(), b.as_f64());
                    if a.is_nan() && b.is_nan() {
                        true
                    } else {
                        a == b && a.is_sign_negative() == b.is_sign_negative()
                    }
                }
            },
            _ => self == other,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Short human readable rendering used in diagnostics.
    pub(crate) fn describe(&self) -> String {
        format!("{self:?}")
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Whether a write of `new` over `old` is observable.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !new.same_value(old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (self.as_float(), other.as_float());
                match (a, b) {
                    (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                    _ => false,
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                3u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => match integral(*f) {
                // Integral floats must hash like the equal Int.
                Some(i) => {
                    3u8.hash(state);
                    i.hash(state);
                }
                None if f.is_nan() => 4u8.hash(state),
                None => {
                    5u8.hash(state);
                    f.to_bits().hash(state);
                }
            },
            Value::Str(s) => {
                6u8.hash(state);
                s.hash(state);
            }
            Value::Object(target) => {
                7u8.hash(state);
                target.id().hash(state);
            }
            Value::Reactive(view) => {
                8u8.hash(state);
                view.hash(state);
            }
            Value::Cell(cell) => {
                9u8.hash(state);
                cell.addr().hash(state);
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(target) => write!(f, "{target:?}"),
            Value::Reactive(view) => write!(f, "{view:?}"),
            Value::Cell(cell) => write!(f, "{cell:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Reactive> for Value {
    fn from(view: Reactive) -> Self {
        Value::Reactive(view)
    }
}

impl From<&Reactive> for Value {
    fn from(view: &Reactive) -> Self {
        Value::Reactive(view.clone())
    }
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        Value::Cell(ReactiveCell::Signal(signal))
    }
}

impl From<Memo> for Value {
    fn from(memo: Memo) -> Self {
        Value::Cell(ReactiveCell::Memo(memo))
    }
}

impl From<ReactiveCell> for Value {
    fn from(cell: ReactiveCell) -> Self {
        Value::Cell(cell)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
