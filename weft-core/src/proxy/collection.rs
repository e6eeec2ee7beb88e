//! Map and set operations on a wrapped view.
//!
//! Keys are resolved in two forms: the key as given and its raw form. Reads
//! record a dependency on both, so a computation that looked an entry up by
//! its wrapped key still hears about writes made with the raw key. Writes
//! try the given key first and fall back to the raw key.
//!
//! Enumerating reads (`size`, `for_each`, the iterators) depend on the
//! enumeration sentinel. `keys()` on a map depends on a separate sentinel so
//! that overwriting a value does not re-run key-only readers.

use super::view::Reactive;
use super::{is_readonly, is_shallow, to_raw};
use crate::config::{self, AliasPolicy};
use crate::error::ReactiveError;
use crate::reactive::{Runtime, TrackOp, Trigger, TriggerOp};
use crate::value::{has_changed, Key, Target, TargetKind, Value};

/// Collection view over a wrapped map or set target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionView(Reactive);

impl CollectionView {
    pub(crate) fn new(view: Reactive) -> Self {
        Self(view)
    }

    pub fn view(&self) -> &Reactive {
        &self.0
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind()
    }

    fn raw(&self) -> &Target {
        self.0.raw_target()
    }

    fn is_map(&self) -> bool {
        self.kind() == TargetKind::Map
    }

    fn supports(&self, op: &'static str, kind: TargetKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        config::report(ReactiveError::Unsupported {
            op,
            kind: self.kind(),
        });
        false
    }

    fn rejects_writes(&self, op: &'static str, key: Option<&Value>) -> bool {
        if !self.0.is_readonly() {
            return false;
        }
        config::report(ReactiveError::Readonly {
            op,
            key: key.map(Value::describe),
        });
        true
    }

    /// Record a read of `key`, in both its given and raw forms.
    fn track_key(&self, op: TrackOp, key: &Value, raw_key: &Value) {
        if key != raw_key {
            self.0.track(op, Key::Entry(key.clone()));
        }
        self.0.track(op, Key::Entry(raw_key.clone()));
    }

    /// Convert a value about to be stored to its raw form, unless this view
    /// is shallow or the value is itself shallow or readonly.
    fn storable(&self, value: Value) -> Value {
        if !self.0.is_shallow() && !is_shallow(&value) && !is_readonly(&value) {
            to_raw(&value)
        } else {
            value
        }
    }

    /// Whether a write addressed by `key` may proceed when its raw form is
    /// also present as a distinct key.
    fn check_identity_keys(&self, key: &Value) -> bool {
        let raw_key = to_raw(key);
        if raw_key == *key || !self.raw().contains(&raw_key) {
            return true;
        }
        config::report(ReactiveError::AliasedKey {
            key: key.describe(),
        });
        config::current().alias_policy != AliasPolicy::Reject
    }

    /// Resolve the key a write applies to: the key as given when present,
    /// else its raw form. `None` when an aliasing write is refused.
    fn resolve_key(&self, key: Value) -> Option<(Value, bool)> {
        if self.raw().contains(&key) {
            return self.check_identity_keys(&key).then_some((key, true));
        }
        let raw_key = to_raw(&key);
        let had_key = self.raw().contains(&raw_key);
        Some((raw_key, had_key))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value under `key` in a map, wrapped in this view's flavor.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        if !self.supports("get", TargetKind::Map) {
            return Value::Undefined;
        }
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_key(TrackOp::Get, &key, &raw_key);

        let found = self
            .raw()
            .lookup(&key)
            .or_else(|| self.raw().lookup(&raw_key));
        match found {
            Some(value) => self.0.wrap_value(value),
            None => Value::Undefined,
        }
    }

    /// Whether a map has `key`, or a set has the member `key`.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_key(TrackOp::Has, &key, &raw_key);
        self.raw().contains(&key) || (key != raw_key && self.raw().contains(&raw_key))
    }

    /// Number of entries. Depends on the enumeration.
    pub fn size(&self) -> usize {
        self.0.track(TrackOp::Iterate, Key::Iterate);
        self.raw().len()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Add a member to a set.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        if self.rejects_writes("Add", Some(&value)) || !self.supports("add", TargetKind::Set) {
            return self;
        }
        let value = self.storable(value);
        if !self.raw().contains(&value) {
            self.raw().add(value.clone());
            Runtime::trigger(
                self.raw(),
                Trigger::new(TriggerOp::Add, Some(Key::Entry(value.clone()))).with_new(value),
            );
        }
        self
    }

    /// Store `value` under `key` in a map.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        let key = key.into();
        if self.rejects_writes("Set", Some(&key)) || !self.supports("set", TargetKind::Map) {
            return self;
        }
        let value = self.storable(value.into());
        let Some((key, _)) = self.resolve_key(key) else {
            return self;
        };

        let old = self.raw().insert(key.clone(), value.clone());
        let trigger = match old {
            None => Trigger::new(TriggerOp::Add, Some(Key::Entry(key))).with_new(value),
            Some(old) if has_changed(&value, &old) => {
                Trigger::new(TriggerOp::Set, Some(Key::Entry(key)))
                    .with_new(value)
                    .with_old(Some(old))
            }
            Some(_) => return self,
        };
        Runtime::trigger(self.raw(), trigger);
        self
    }

    /// Remove a map key or set member. Returns whether it was present.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.rejects_writes("Delete", Some(&key)) {
            return false;
        }
        let Some((key, had_key)) = self.resolve_key(key) else {
            return false;
        };
        let old = self.raw().lookup(&key);
        let removed = self.raw().remove(&key);
        if had_key {
            Runtime::trigger(
                self.raw(),
                Trigger::new(TriggerOp::Delete, Some(Key::Entry(key))).with_old(old),
            );
        }
        removed
    }

    /// Remove every entry. Notifies every computation that read anything
    /// from this collection.
    pub fn clear(&self) {
        if self.rejects_writes("Clear", None) {
            return;
        }
        let had_items = !self.raw().is_empty();
        let snapshot = (had_items && config::current().dev_warnings).then(|| self.raw().entries());
        self.raw().clear();
        if had_items {
            Runtime::trigger(
                self.raw(),
                Trigger::new(TriggerOp::Clear, None).with_old_target(snapshot),
            );
        }
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// Call `f(value, key, view)` for every entry, in insertion order, with
    /// `view` being this collection. Set members are passed as both value
    /// and key.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value, &CollectionView)) {
        self.0.track(TrackOp::Iterate, Key::Iterate);
        let mut pos = 0;
        while let Some((key, value)) = self.raw().entry_at(pos) {
            pos += 1;
            f(self.0.wrap_value(value), self.0.wrap_value(key), self);
        }
    }

    /// Keys of a map, or members of a set.
    pub fn keys(&self) -> CollectionIter {
        let sentinel = if self.is_map() {
            Key::MapKeyIterate
        } else {
            Key::Iterate
        };
        self.0.track(TrackOp::Iterate, sentinel);
        CollectionIter::new(self.clone(), Part::Keys)
    }

    /// Values of a map, or members of a set.
    pub fn values(&self) -> CollectionIter {
        self.0.track(TrackOp::Iterate, Key::Iterate);
        CollectionIter::new(self.clone(), Part::Values)
    }

    /// `(key, value)` pairs; set members are paired with themselves.
    pub fn entries(&self) -> Entries {
        self.0.track(TrackOp::Iterate, Key::Iterate);
        Entries {
            view: self.clone(),
            pos: 0,
        }
    }

    /// Default iteration: entries of a map, `(member, member)` for a set.
    pub fn iter(&self) -> Entries {
        self.entries()
    }

    fn wrapped_entry_at(&self, pos: usize) -> Option<(Value, Value)> {
        self.raw()
            .entry_at(pos)
            .map(|(key, value)| (self.0.wrap_value(key), self.0.wrap_value(value)))
    }
}

#[derive(Debug, Clone, Copy)]
enum Part {
    Keys,
    Values,
}

/// Lazy iterator over the keys or values of a collection view.
///
/// Each step reads the entry at the next insertion position, so entries
/// added during iteration are visited and removing a visited entry may
/// skip one.
#[derive(Debug, Clone)]
pub struct CollectionIter {
    view: CollectionView,
    pos: usize,
    part: Part,
}

impl CollectionIter {
    fn new(view: CollectionView, part: Part) -> Self {
        Self { view, pos: 0, part }
    }
}

impl Iterator for CollectionIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (key, value) = self.view.wrapped_entry_at(self.pos)?;
        self.pos += 1;
        Some(match self.part {
            Part::Keys => key,
            Part::Values => value,
        })
    }
}

/// Lazy iterator over the entries of a collection view.
#[derive(Debug, Clone)]
pub struct Entries {
    view: CollectionView,
    pos: usize,
}

impl Iterator for Entries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        let entry = self.view.wrapped_entry_at(self.pos)?;
        self.pos += 1;
        Some(entry)
    }
}
