//! Raw containers.
//!
//! A [`Target`] is the plain, unobserved data behind a wrapped view. Every
//! operation here is untracked: reading or writing a target directly never
//! subscribes or notifies anything. The proxy layer builds on these
//! primitives and adds tracking around them.
//!
//! The engine never owns targets. The dependency registry and the view caches
//! key their entries by [`TargetId`]; when the last handle to a target is
//! dropped, its id is handed to both so the entries can be swept.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::key::MAX_ARRAY_LENGTH;
use super::{Key, Value};

/// Counter for generating unique target IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable identity token of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The shape of a target, which decides how its keys and writes behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Record,
    Array,
    Map,
    Set,
}

impl TargetKind {
    /// Map-like and set-like targets use the collection instrumentation.
    pub fn is_collection(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::Set)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Record => "record",
            TargetKind::Array => "array",
            TargetKind::Map => "map",
            TargetKind::Set => "set",
        })
    }
}

enum Storage {
    Record(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

struct TargetInner {
    id: TargetId,
    storage: RefCell<Storage>,
    proto: RefCell<Option<Value>>,
    skip: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        crate::graph::registry::forget(self.id);
        crate::proxy::cache::forget(self.id);
    }
}

/// A shared handle to a raw container.
///
/// Cloning the handle shares the container; equality is identity.
#[derive(Clone)]
pub struct Target(Rc<TargetInner>);

impl Target {
    fn with_storage(storage: Storage) -> Self {
        Self(Rc::new(TargetInner {
            id: TargetId::next(),
            storage: RefCell::new(storage),
            proto: RefCell::new(None),
            skip: Cell::new(false),
        }))
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::with_storage(Storage::Record(IndexMap::new()))
    }

    /// An empty record whose missing properties are looked up on `proto`.
    pub fn record_with_proto(proto: impl Into<Value>) -> Self {
        let target = Self::record();
        target.set_prototype(Some(proto.into()));
        target
    }

    /// A record with the given properties, in order.
    pub fn record_from<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let props = props
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_storage(Storage::Record(props))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::with_storage(Storage::Array(Vec::new()))
    }

    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_storage(Storage::Array(items.into_iter().map(Into::into).collect()))
    }

    /// An empty map-like collection.
    pub fn map() -> Self {
        Self::with_storage(Storage::Map(IndexMap::new()))
    }

    pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_storage(Storage::Map(entries))
    }

    /// An empty set-like collection.
    pub fn set() -> Self {
        Self::with_storage(Storage::Set(IndexSet::new()))
    }

    pub fn set_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_storage(Storage::Set(items.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        match &*self.0.storage.borrow() {
            Storage::Record(_) => TargetKind::Record,
            Storage::Array(_) => TargetKind::Array,
            Storage::Map(_) => TargetKind::Map,
            Storage::Set(_) => TargetKind::Set,
        }
    }

    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Flag this target so it is never wrapped.
    pub fn mark_raw(&self) {
        self.0.skip.set(true);
    }

    pub fn is_marked_raw(&self) -> bool {
        self.0.skip.get()
    }

    pub fn prototype(&self) -> Option<Value> {
        self.0.proto.borrow().clone()
    }

    /// Replace the prototype. Refuses (returning false) a prototype whose
    /// chain leads back to this target.
    pub fn set_prototype(&self, proto: Option<Value>) -> bool {
        let mut cursor = proto.as_ref().and_then(Value::target);
        while let Some(next) = cursor {
            if next.ptr_eq(self) {
                return false;
            }
            cursor = next.prototype().as_ref().and_then(Value::target);
        }
        let previous = self.0.proto.replace(proto);
        drop(previous);
        true
    }

    /// Number of properties, elements, or entries.
    pub fn len(&self) -> usize {
        match &*self.0.storage.borrow() {
            Storage::Record(props) => props.len(),
            Storage::Array(items) => items.len(),
            Storage::Map(entries) => entries.len(),
            Storage::Set(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Property surface (records and arrays)
    // ------------------------------------------------------------------

    /// The own value stored under `key`, if any.
    pub fn get_own(&self, key: &Key) -> Option<Value> {
        match (&*self.0.storage.borrow(), key) {
            (Storage::Record(props), Key::Prop(name)) => props.get(name).cloned(),
            (Storage::Array(items), Key::Index(index)) => items.get(*index).cloned(),
            (Storage::Array(items), Key::Length) => Some(Value::from(items.len())),
            (Storage::Map(entries), Key::Entry(k)) => entries.get(k).cloned(),
            (Storage::Set(items), Key::Entry(v)) => items.get(v).cloned(),
            _ => None,
        }
    }

    pub fn has_own(&self, key: &Key) -> bool {
        match (&*self.0.storage.borrow(), key) {
            (Storage::Record(props), Key::Prop(name)) => props.contains_key(name),
            (Storage::Array(items), Key::Index(index)) => *index < items.len(),
            (Storage::Array(_), Key::Length) => true,
            (Storage::Map(entries), Key::Entry(k)) => entries.contains_key(k),
            (Storage::Set(items), Key::Entry(v)) => items.contains(v),
            _ => false,
        }
    }

    /// Store `value` under `key`. Returns false when the key does not apply
    /// to this kind of target.
    ///
    /// Writing an index past the end of an array extends it with
    /// `Undefined`; writing `Length` truncates or extends. Lengths above
    /// [`MAX_ARRAY_LENGTH`] are refused.
    pub fn set_own(&self, key: Key, value: Value) -> bool {
        match (&mut *self.0.storage.borrow_mut(), key) {
            (Storage::Record(props), Key::Prop(name)) => {
                props.insert(name, value);
                true
            }
            (Storage::Array(items), Key::Index(index)) => {
                let Some(len) = index.checked_add(1) else {
                    return false;
                };
                if !resize_items(items, len) {
                    return false;
                }
                items[index] = value;
                true
            }
            (Storage::Array(items), Key::Length) => {
                match value.as_int().and_then(|len| usize::try_from(len).ok()) {
                    Some(len) => resize_items(items, len),
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Remove the own property `key`.
    ///
    /// Array elements become holes (`Undefined`) and the length is kept;
    /// `Length` itself cannot be deleted.
    pub fn delete_own(&self, key: &Key) -> bool {
        match (&mut *self.0.storage.borrow_mut(), key) {
            (Storage::Record(props), Key::Prop(name)) => {
                props.shift_remove(name);
                true
            }
            (Storage::Array(items), Key::Index(index)) => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = Value::Undefined;
                }
                true
            }
            (Storage::Array(_), Key::Length) => false,
            _ => true,
        }
    }

    /// Own keys in enumeration order.
    pub fn own_keys(&self) -> Vec<Key> {
        match &*self.0.storage.borrow() {
            Storage::Record(props) => props.keys().cloned().map(Key::Prop).collect(),
            Storage::Array(items) => (0..items.len()).map(Key::Index).collect(),
            Storage::Map(entries) => entries.keys().cloned().map(Key::Entry).collect(),
            Storage::Set(items) => items.iter().cloned().map(Key::Entry).collect(),
        }
    }

    /// A copy of the elements of an array (empty for other kinds).
    pub fn to_vec(&self) -> Vec<Value> {
        match &*self.0.storage.borrow() {
            Storage::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Position of the first (or last) element equal to `needle`.
    pub(crate) fn position(&self, needle: &Value, from_end: bool) -> Option<usize> {
        match &*self.0.storage.borrow() {
            Storage::Array(items) if from_end => items.iter().rposition(|v| v == needle),
            Storage::Array(items) => items.iter().position(|v| v == needle),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Collection surface (maps and sets)
    // ------------------------------------------------------------------

    /// Whether a map has the key, or a set has the member.
    pub fn contains(&self, key: &Value) -> bool {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.contains_key(key),
            Storage::Set(items) => items.contains(key),
            _ => false,
        }
    }

    /// The value stored under `key` in a map.
    pub fn lookup(&self, key: &Value) -> Option<Value> {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.get(key).cloned(),
            _ => None,
        }
    }

    /// Insert into a map, returning the previous value.
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => entries.insert(key, value),
            _ => None,
        }
    }

    /// Add a member to a set. Returns whether it was newly added.
    pub fn add(&self, value: Value) -> bool {
        match &mut *self.0.storage.borrow_mut() {
            Storage::Set(items) => items.insert(value),
            _ => false,
        }
    }

    /// Remove a map key or set member, keeping the order of the rest.
    pub fn remove(&self, key: &Value) -> bool {
        // The removed entry is returned out of the borrow before it drops.
        let removed = match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => entries.shift_remove_entry(key).map(|(k, v)| vec![k, v]),
            Storage::Set(items) => items.shift_take(key).map(|v| vec![v]),
            _ => None,
        };
        removed.is_some()
    }

    /// Remove every entry of a map or set.
    pub fn clear(&self) {
        let drained = self.entries();
        match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => entries.clear(),
            Storage::Set(items) => items.clear(),
            _ => {}
        }
        drop(drained);
    }

    /// The entry at insertion position `pos`. Set members are reported as
    /// `(member, member)`.
    pub fn entry_at(&self, pos: usize) -> Option<(Value, Value)> {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries
                .get_index(pos)
                .map(|(k, v)| (k.clone(), v.clone())),
            Storage::Set(items) => items.get_index(pos).map(|v| (v.clone(), v.clone())),
            _ => None,
        }
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Storage::Set(items) => items.iter().map(|v| (v.clone(), v.clone())).collect(),
            _ => Vec::new(),
        }
    }
}

/// Grow or shrink `items` to `len`, padding with `Undefined`. Refuses
/// lengths past [`MAX_ARRAY_LENGTH`] and growth the allocator cannot serve.
fn resize_items(items: &mut Vec<Value>, len: usize) -> bool {
    if len > MAX_ARRAY_LENGTH {
        return false;
    }
    if len > items.len() && items.try_reserve(len - items.len()).is_err() {
        return false;
    }
    items.resize(len, Value::Undefined);
    true
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}(len={})", self.kind(), self.0.id.0, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = Target::record();
        let b = Target::record();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn array_writes_extend_and_truncate() {
        let arr = Target::array_from([1, 2, 3]);
        assert!(arr.set_own(Key::Index(5), Value::from(6)));
        assert_eq!(arr.len(), 6);
        assert!(arr.get_own(&Key::Index(4)).is_some_and(|v| v.is_undefined()));

        assert!(arr.set_own(Key::Length, Value::from(1)));
        assert_eq!(arr.to_vec(), vec![Value::from(1)]);
        assert!(!arr.set_own(Key::Length, Value::from(-1)));
    }

    #[test]
    fn out_of_range_array_writes_are_refused() {
        let arr = Target::array_from([1, 2]);
        assert!(!arr.set_own(Key::Index(usize::MAX), Value::from(5)));
        assert!(!arr.set_own(Key::Index(MAX_ARRAY_LENGTH), Value::from(5)));
        assert!(!arr.set_own(Key::Length, Value::from(i64::MAX)));
        assert!(!arr.set_own(Key::Length, Value::from(1e12)));
        assert_eq!(arr.to_vec(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn array_delete_leaves_hole() {
        let arr = Target::array_from([1, 2]);
        assert!(arr.delete_own(&Key::Index(0)));
        assert_eq!(arr.len(), 2);
        assert!(arr.get_own(&Key::Index(0)).is_some_and(|v| v.is_undefined()));
        assert!(!arr.delete_own(&Key::Length));
    }

    #[test]
    fn record_keeps_insertion_order() {
        let rec = Target::record_from([("b", 1), ("a", 2)]);
        rec.set_own(Key::from("c"), Value::from(3));
        rec.delete_own(&Key::from("b"));
        assert_eq!(rec.own_keys(), vec![Key::from("a"), Key::from("c")]);
    }

    #[test]
    fn prototype_cycles_are_refused() {
        let base = Target::record();
        let child = Target::record_with_proto(&base);
        assert!(!base.set_prototype(Some(Value::from(&child))));
        assert!(base.prototype().is_none());
        assert!(child.set_prototype(None));
    }

    #[test]
    fn map_operations() {
        let map = Target::map();
        assert_eq!(map.insert(Value::from("k"), Value::from(1)), None);
        assert_eq!(map.insert(Value::from("k"), Value::from(2)), Some(Value::from(1)));
        assert!(map.contains(&Value::from("k")));
        assert_eq!(map.entry_at(0), Some((Value::from("k"), Value::from(2))));
        assert!(map.remove(&Value::from("k")));
        assert!(!map.remove(&Value::from("k")));
        assert!(map.is_empty());
    }

    #[test]
    fn set_operations() {
        let set = Target::set_from([1, 2]);
        assert!(!set.add(Value::from(1)));
        assert!(set.add(Value::from(3)));
        assert_eq!(set.len(), 3);
        set.clear();
        assert!(set.is_empty());
    }
}
