//! Wrapped Views
//!
//! A view is a handle over a raw [`Target`] that intercepts every read and
//! write: reads record dependencies, writes announce changes, and nested
//! containers read through a view come back wrapped in the same flavor.
//!
//! # Variants
//!
//! | Variant           | writes    | nested values      |
//! |-------------------|-----------|--------------------|
//! | `Mutable`         | allowed   | wrapped mutable    |
//! | `Readonly`        | rejected  | wrapped readonly   |
//! | `Shallow`         | allowed   | returned raw       |
//! | `ShallowReadonly` | rejected  | returned raw       |
//!
//! Readonly views do not record dependencies, since nothing can change
//! through them. A readonly view over a mutable view is *layered*: it
//! rejects writes itself but records reads through the inner view, so it
//! still observes changes made elsewhere.
//!
//! # Identity
//!
//! Wrapping the same target with the same variant returns the same view for
//! as long as some handle to that view is alive (see [`cache`]).

pub(crate) mod array;
pub(crate) mod cache;
pub(crate) mod collection;
pub(crate) mod view;

pub use array::ArrayView;
pub use collection::{CollectionIter, CollectionView, Entries};
pub use view::Reactive;

use crate::config;
use crate::error::ReactiveError;
use crate::value::{Target, Value};
use cache::CacheKey;

/// The flavor of a wrapped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Mutable,
    Readonly,
    Shallow,
    ShallowReadonly,
}

impl Variant {
    pub fn is_readonly(self) -> bool {
        matches!(self, Variant::Readonly | Variant::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Variant::Shallow | Variant::ShallowReadonly)
    }
}

/// Wrap `value` in a view of the given variant.
///
/// - Targets marked raw are returned unwrapped.
/// - A view of the requested variant is returned as is; so is any readonly
///   view, and any view asked to become mutable.
/// - A mutable view asked to become readonly gets a readonly layer on top.
/// - Cells are returned as is; other primitives too, with a diagnostic.
pub fn wrap(value: impl Into<Value>, variant: Variant) -> Value {
    match value.into() {
        Value::Object(target) => create_view(target, None, variant),
        Value::Reactive(view) => {
            if variant.is_readonly() && !view.is_readonly() {
                let target = view.raw_target().clone();
                create_view(target, Some(view), variant)
            } else {
                Value::Reactive(view)
            }
        }
        cell @ Value::Cell(_) => cell,
        other => {
            config::report(ReactiveError::NotObject {
                value: other.describe(),
            });
            other
        }
    }
}

fn create_view(target: Target, inner: Option<Reactive>, variant: Variant) -> Value {
    if target.is_marked_raw() {
        return match inner {
            Some(view) => Value::Reactive(view),
            None => Value::Object(target),
        };
    }
    let key = CacheKey::new(target.id(), variant, inner.as_ref().map(Reactive::variant));
    if let Some(view) = cache::lookup(&key) {
        return Value::Reactive(view);
    }
    let view = Reactive::new(target, variant, inner);
    cache::insert(key, &view);
    Value::Reactive(view)
}

/// Deep mutable view of a container.
pub fn reactive(value: impl Into<Value>) -> Value {
    wrap(value, Variant::Mutable)
}

/// Deep readonly view of a container.
pub fn readonly(value: impl Into<Value>) -> Value {
    wrap(value, Variant::Readonly)
}

/// Mutable view that does not wrap nested values.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    wrap(value, Variant::Shallow)
}

/// Readonly view that does not wrap nested values.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    wrap(value, Variant::ShallowReadonly)
}

/// Whether `value` is a mutable view, or a readonly layer over one.
pub fn is_reactive(value: &Value) -> bool {
    value.as_reactive().is_some_and(Reactive::is_reactive)
}

/// Whether `value` rejects writes: readonly views and memos.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Reactive(view) => view.is_readonly(),
        Value::Cell(cell) => cell.is_readonly(),
        _ => false,
    }
}

/// Whether `value` is a shallow view or a shallow signal.
pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Reactive(view) => view.is_shallow(),
        Value::Cell(cell) => cell.is_shallow(),
        _ => false,
    }
}

/// Whether `value` is any kind of view.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// The raw target behind any number of view layers, or `value` itself.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(view) => Value::Object(view.raw_target().clone()),
        other => other.clone(),
    }
}

/// Flag the target behind `value` so it is never wrapped, and return
/// `value`.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(target) = &value {
        target.mark_raw();
    }
    value
}

/// A mutable view for containers; anything else unchanged.
pub fn to_reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    if value.is_object() {
        reactive(value)
    } else {
        value
    }
}

/// A readonly view for containers; anything else unchanged.
pub fn to_readonly(value: impl Into<Value>) -> Value {
    let value = value.into();
    if value.is_object() {
        readonly(value)
    } else {
        value
    }
}
