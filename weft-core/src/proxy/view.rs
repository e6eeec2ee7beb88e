//! The base interception layer for records and arrays.
//!
//! Every read through a [`Reactive`] view records a dependency on the key it
//! read, and every write that changes the target announces which keys
//! changed. Nested containers read through a view come back wrapped in the
//! view's flavor; cells stored in the target are unwrapped on read and
//! written through on write.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use super::array::ArrayView;
use super::cache::{self, CacheKey};
use super::collection::CollectionView;
use super::{is_readonly, is_shallow, to_raw, to_readonly, to_reactive, Variant};
use crate::config;
use crate::error::ReactiveError;
use crate::reactive::{Runtime, TrackOp, Trigger, TriggerOp};
use crate::value::{has_changed, Key, ReactiveFlag, Target, TargetKind, Value};

pub(crate) struct ViewInner {
    target: Target,
    variant: Variant,
    /// The view a readonly layer reads through.
    inner: Option<Reactive>,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        let key = CacheKey::new(
            self.target.id(),
            self.variant,
            self.inner.as_ref().map(Reactive::variant),
        );
        cache::evict(&key);
    }
}

/// A wrapped view over a raw [`Target`].
///
/// Views compare and hash by identity; wrapping the same target twice with
/// the same variant yields the same view.
#[derive(Clone)]
pub struct Reactive(Rc<ViewInner>);

impl Reactive {
    pub(crate) fn new(target: Target, variant: Variant, inner: Option<Reactive>) -> Self {
        Self(Rc::new(ViewInner {
            target,
            variant,
            inner,
        }))
    }

    pub(crate) fn from_inner(inner: Rc<ViewInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ViewInner> {
        Rc::downgrade(&self.0)
    }

    /// The raw target behind this view and any view it layers over.
    pub fn raw_target(&self) -> &Target {
        &self.0.target
    }

    pub fn variant(&self) -> Variant {
        self.0.variant
    }

    pub fn kind(&self) -> TargetKind {
        self.0.target.kind()
    }

    /// The mutable view a readonly layer reads through.
    pub fn inner(&self) -> Option<&Reactive> {
        self.0.inner.as_ref()
    }

    /// Whether this view, or the view it layers over, is mutable.
    pub fn is_reactive(&self) -> bool {
        match &self.0.inner {
            Some(inner) => inner.is_reactive(),
            None => !self.0.variant.is_readonly(),
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.0.variant.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.variant.is_shallow()
    }

    /// Array operations, if the target is an array.
    pub fn as_array(&self) -> Option<ArrayView> {
        (self.kind() == TargetKind::Array).then(|| ArrayView::new(self.clone()))
    }

    /// Map and set operations, if the target is a collection.
    pub fn as_collection(&self) -> Option<CollectionView> {
        self.kind()
            .is_collection()
            .then(|| CollectionView::new(self.clone()))
    }

    /// Record a read on the target, through the inner view for a readonly
    /// layer. Plain readonly views record nothing.
    pub(crate) fn track(&self, op: TrackOp, key: Key) {
        match &self.0.inner {
            Some(inner) => inner.track(op, key),
            None if !self.is_readonly() => Runtime::track(&self.0.target, op, key),
            None => {}
        }
    }

    /// Wrap a raw value read from the target in this view's flavor.
    pub(crate) fn wrap_value(&self, raw: Value) -> Value {
        match (&self.0.inner, self.is_shallow(), self.is_readonly()) {
            (Some(inner), true, _) => inner.wrap_value(raw),
            (Some(inner), false, _) => to_readonly(inner.wrap_value(raw)),
            (None, true, _) => raw,
            (None, false, true) => to_readonly(raw),
            (None, false, false) => to_reactive(raw),
        }
    }

    fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(self.is_reactive()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.is_shallow()),
            ReactiveFlag::Raw => Value::Object(self.0.target.clone()),
            ReactiveFlag::Skip => Value::Bool(self.0.target.is_marked_raw()),
        }
    }

    // ------------------------------------------------------------------
    // Property surface
    // ------------------------------------------------------------------

    /// Read `key`.
    ///
    /// Records a dependency on `key`. Cells are unwrapped, except when read
    /// by index from an array. Containers come back wrapped in this view's
    /// flavor. Missing keys are looked up on the prototype chain.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into().normalize(self.kind());
        match &key {
            Key::Flag(flag) => return self.flag(*flag),
            Key::Proto => return self.0.target.prototype().unwrap_or(Value::Null),
            Key::Iterate | Key::MapKeyIterate => return Value::Undefined,
            _ => {}
        }
        if self.kind().is_collection() {
            return match &key {
                Key::Prop(name) if &**name == "size" => self
                    .as_collection()
                    .map_or(Value::Undefined, |c| Value::from(c.size())),
                _ => Value::Undefined,
            };
        }

        self.track(TrackOp::Get, key.clone());
        let res = lookup_chain(&self.0.target, &key);
        if self.is_shallow() {
            return self.wrap_value(res);
        }
        if let Value::Cell(cell) = &res {
            if self.kind() == TargetKind::Array && matches!(key, Key::Index(_)) {
                return res;
            }
            return cell.get();
        }
        self.wrap_value(res)
    }

    /// Whether `key` exists on the target or its prototype chain. Records a
    /// dependency either way.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into().normalize(self.kind());
        if key.is_reserved() || self.kind().is_collection() {
            return false;
        }
        let result = has_chain(&self.0.target, &key);
        self.track(TrackOp::Has, key);
        result
    }

    /// Own keys in order. Records a dependency on the enumeration (on the
    /// length, for arrays).
    pub fn own_keys(&self) -> Vec<Key> {
        match self.kind() {
            TargetKind::Map | TargetKind::Set => Vec::new(),
            TargetKind::Array => {
                self.track(TrackOp::Iterate, Key::Length);
                self.0.target.own_keys()
            }
            TargetKind::Record => {
                self.track(TrackOp::Iterate, Key::Iterate);
                self.0.target.own_keys()
            }
        }
    }

    /// Write `value` under `key`. Returns whether the write was accepted.
    ///
    /// Views are stored raw. A cell stored under `key` receives the value
    /// instead of being replaced. Writes that do not change the value are
    /// accepted silently. Readonly views report and accept without writing.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into().normalize(self.kind());
        let value = value.into();
        if self.is_readonly() {
            config::report(ReactiveError::Readonly {
                op: "Set",
                key: Some(format!("{key:?}")),
            });
            return true;
        }
        if key.is_reserved() || self.kind().is_collection() {
            return false;
        }
        let receiver = self.0.target.clone();
        self.set_on(key, value, &receiver)
    }

    /// The write half of [`Reactive::set`], with `receiver` being the target
    /// the write was originally addressed to. A write that reaches this view
    /// through a prototype chain lands on the receiver, and only the
    /// receiver's own view announces it.
    fn set_on(&self, key: Key, mut value: Value, receiver: &Target) -> bool {
        let target = &self.0.target;
        let array = target.kind() == TargetKind::Array;
        let mut old = target
            .get_own(&key)
            .unwrap_or_else(|| raw_chain(target, &key));

        if !self.is_shallow() {
            let old_is_readonly = is_readonly(&old);
            if !is_shallow(&value) && !is_readonly(&value) {
                old = to_raw(&old);
                value = to_raw(&value);
            }
            if !array && !matches!(value, Value::Cell(_)) {
                if let Value::Cell(cell) = &old {
                    if old_is_readonly {
                        config::report(ReactiveError::ReadonlyCell {
                            key: format!("{key:?}"),
                        });
                        return false;
                    }
                    return cell.set(value);
                }
            }
        }

        let had_key = target.has_own(&key);
        let owner = target.ptr_eq(receiver);
        let result = match target.prototype() {
            Some(Value::Reactive(proto)) if owner && !had_key && has_chain(proto.raw_target(), &key) => {
                proto.set_through(key.clone(), value.clone(), receiver)
            }
            _ => receiver.set_own(key.clone(), value.clone()),
        };

        if owner && result {
            if !had_key {
                if receiver.has_own(&key) {
                    Runtime::trigger(
                        target,
                        Trigger::new(TriggerOp::Add, Some(key)).with_new(value),
                    );
                }
            } else if has_changed(&value, &old) {
                Runtime::trigger(
                    target,
                    Trigger::new(TriggerOp::Set, Some(key))
                        .with_new(value)
                        .with_old(Some(old)),
                );
            }
        }
        result
    }

    /// A write that missed the receiver and found `key` on this prototype.
    fn set_through(&self, key: Key, value: Value, receiver: &Target) -> bool {
        if self.is_readonly() {
            config::report(ReactiveError::Readonly {
                op: "Set",
                key: Some(format!("{key:?}")),
            });
            return true;
        }
        let key = key.normalize(self.kind());
        self.set_on(key, value, receiver)
    }

    /// Remove `key`. Announces the removal if the key existed. Readonly
    /// views report and accept without deleting.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into().normalize(self.kind());
        if self.is_readonly() {
            config::report(ReactiveError::Readonly {
                op: "Delete",
                key: Some(format!("{key:?}")),
            });
            return true;
        }
        if key.is_reserved() || self.kind().is_collection() {
            return false;
        }
        let target = &self.0.target;
        let had_key = target.has_own(&key);
        let old = target.get_own(&key);
        let result = target.delete_own(&key);
        if result && had_key {
            Runtime::trigger(
                target,
                Trigger::new(TriggerOp::Delete, Some(key)).with_old(old),
            );
        }
        result
    }

    /// Point the target at a new prototype. Refuses cycles.
    pub fn set_prototype(&self, proto: Option<Value>) -> bool {
        if self.is_readonly() {
            config::report(ReactiveError::Readonly {
                op: "SetPrototype",
                key: None,
            });
            return true;
        }
        self.0.target.set_prototype(proto)
    }
}

/// Value of `key` on `target` or the first prototype that has it. A
/// prototype that is a view is read through the view.
fn lookup_chain(target: &Target, key: &Key) -> Value {
    if let Some(value) = target.get_own(key) {
        return value;
    }
    match target.prototype() {
        Some(Value::Reactive(proto)) => proto.get(key.clone()),
        Some(Value::Object(proto)) => lookup_chain(&proto, key),
        _ => Value::Undefined,
    }
}

/// Like [`lookup_chain`] but never tracks.
fn raw_chain(target: &Target, key: &Key) -> Value {
    match target.prototype().as_ref().and_then(Value::target) {
        Some(proto) => proto
            .get_own(key)
            .unwrap_or_else(|| raw_chain(&proto, key)),
        None => Value::Undefined,
    }
}

fn has_chain(target: &Target, key: &Key) -> bool {
    if target.has_own(key) {
        return true;
    }
    match target.prototype() {
        Some(Value::Reactive(proto)) => proto.has(key.clone()),
        Some(Value::Object(proto)) => has_chain(&proto, key),
        _ => false,
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Reactive {}

impl Hash for Reactive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}<{:?}>", self.0.variant, self.0.target)
    }
}
