//! Array operations on a wrapped view.
//!
//! Searches compare against the raw elements, so they record a dependency on
//! every index. The length-changing operations run with tracking and
//! scheduling paused: they read the length they are about to write, and
//! every element they move is announced through the view, with the affected
//! computations running once when the operation returns.

use super::view::Reactive;
use super::to_raw;
use crate::config;
use crate::error::ReactiveError;
use crate::graph::SchedulingPause;
use crate::reactive::{TrackOp, TrackingPause};
use crate::value::{Key, Target, Value};

/// Array view over a wrapped array target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayView(Reactive);

/// Holds both pauses for the duration of a mutation. Scheduling resumes
/// first, while tracking is still paused.
struct MutationGuard {
    _scheduling: SchedulingPause,
    _tracking: TrackingPause,
}

impl MutationGuard {
    fn new() -> Self {
        Self {
            _scheduling: SchedulingPause::new(),
            _tracking: TrackingPause::new(),
        }
    }
}

impl ArrayView {
    pub(crate) fn new(view: Reactive) -> Self {
        Self(view)
    }

    pub fn view(&self) -> &Reactive {
        &self.0
    }

    fn raw(&self) -> &Target {
        self.0.raw_target()
    }

    fn raw_at(&self, index: usize) -> Value {
        self.raw().get_own(&Key::Index(index)).unwrap_or_default()
    }

    /// Tracked length.
    pub fn len(&self) -> usize {
        self.0
            .get(Key::Length)
            .as_int()
            .map_or(0, |len| len.max(0) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Value {
        self.0.get(index)
    }

    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        self.0.set(index, value)
    }

    /// Truncate or extend with `Undefined`.
    pub fn set_len(&self, len: usize) -> bool {
        self.0.set(Key::Length, len)
    }

    /// Every element, read through the view.
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }

    // ------------------------------------------------------------------
    // Identity-sensitive searches
    // ------------------------------------------------------------------

    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        self.search(&needle.into(), false).is_some()
    }

    /// Position of the first element identical to `needle`. NaN is never
    /// found.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        if is_nan(&needle) {
            self.track_all();
            return None;
        }
        self.search(&needle, false)
    }

    /// Position of the last element identical to `needle`.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        if is_nan(&needle) {
            self.track_all();
            return None;
        }
        self.search(&needle, true)
    }

    fn track_all(&self) {
        for index in 0..self.len() {
            self.0.track(TrackOp::Get, Key::Index(index));
        }
    }

    /// Search the raw elements, retrying with the raw form of `needle` so a
    /// view finds the element it wraps.
    fn search(&self, needle: &Value, from_end: bool) -> Option<usize> {
        self.track_all();
        self.raw()
            .position(needle, from_end)
            .or_else(|| self.raw().position(&to_raw(needle), from_end))
    }

    // ------------------------------------------------------------------
    // Length-changing mutations
    // ------------------------------------------------------------------

    fn writable(&self, op: &'static str) -> bool {
        if self.0.is_readonly() {
            config::report(ReactiveError::Readonly { op, key: None });
            return false;
        }
        true
    }

    /// Append `items`; returns the new length.
    pub fn push<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if !self.writable("push") {
            return self.raw().len();
        }
        let _guard = MutationGuard::new();
        let mut len = self.raw().len();
        for item in items {
            self.0.set(len, item);
            len += 1;
        }
        self.0.set(Key::Length, len);
        len
    }

    /// Remove and return the last element (`Undefined` when empty).
    pub fn pop(&self) -> Value {
        if !self.writable("pop") {
            return Value::Undefined;
        }
        let _guard = MutationGuard::new();
        let len = self.raw().len();
        if len == 0 {
            self.0.set(Key::Length, 0usize);
            return Value::Undefined;
        }
        let last = self.0.get(len - 1);
        self.0.delete(len - 1);
        self.0.set(Key::Length, len - 1);
        last
    }

    /// Remove and return the first element, moving the rest down.
    pub fn shift(&self) -> Value {
        if !self.writable("shift") {
            return Value::Undefined;
        }
        let _guard = MutationGuard::new();
        let len = self.raw().len();
        if len == 0 {
            self.0.set(Key::Length, 0usize);
            return Value::Undefined;
        }
        let first = self.0.get(0usize);
        for index in 1..len {
            self.0.set(index - 1, self.raw_at(index));
        }
        self.0.delete(len - 1);
        self.0.set(Key::Length, len - 1);
        first
    }

    /// Prepend `items`, moving the existing elements up; returns the new
    /// length.
    pub fn unshift<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if !self.writable("unshift") {
            return self.raw().len();
        }
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _guard = MutationGuard::new();
        let len = self.raw().len();
        let count = items.len();
        if count > 0 {
            for index in (0..len).rev() {
                self.0.set(index + count, self.raw_at(index));
            }
            for (index, item) in items.into_iter().enumerate() {
                self.0.set(index, item);
            }
        }
        self.0.set(Key::Length, len + count);
        len + count
    }

    /// Remove `delete_count` elements at `start` and insert `items` in
    /// their place. Returns the removed elements.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if !self.writable("splice") {
            return Vec::new();
        }
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _guard = MutationGuard::new();
        let len = self.raw().len();
        let start = start.min(len);
        let removed_count = delete_count.min(len - start);
        let count = items.len();

        let removed = (start..start + removed_count)
            .map(|index| self.0.get(index))
            .collect();

        if count < removed_count {
            for index in start..len - removed_count {
                self.0
                    .set(index + count, self.raw_at(index + removed_count));
            }
            for index in (len - removed_count + count..len).rev() {
                self.0.delete(index);
            }
        } else if count > removed_count {
            for index in (start..len - removed_count).rev() {
                self.0
                    .set(index + count, self.raw_at(index + removed_count));
            }
        }
        for (offset, item) in items.into_iter().enumerate() {
            self.0.set(start + offset, item);
        }
        self.0.set(Key::Length, len - removed_count + count);
        removed
    }
}

fn is_nan(value: &Value) -> bool {
    value.as_float().is_some_and(f64::is_nan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{reactive, readonly};
    use crate::reactive::{Effect, Runtime};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn array(values: &[i64]) -> (Target, ArrayView) {
        let target = Target::array_from(values.iter().copied());
        let view = reactive(&target)
            .view()
            .and_then(|view| view.as_array())
            .expect("an array view");
        (target, view)
    }

    fn ints(values: Vec<Value>) -> Vec<i64> {
        values.iter().filter_map(Value::as_int).collect()
    }

    #[test]
    fn push_inside_effect_does_not_loop() {
        let (target, list) = array(&[]);
        let runs = Rc::new(Cell::new(0));
        let (l, r) = (list.clone(), runs.clone());
        let _effect = Effect::new(move || {
            r.set(r.get() + 1);
            l.push([1]);
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(target.len(), 1);
        assert_eq!(Runtime::observed_keys(&target), 0);
    }

    #[test]
    fn two_pushing_effects_do_not_feed_each_other() {
        let (target, list) = array(&[]);
        let effects: Vec<Effect> = (0..2)
            .map(|_| {
                let l = list.clone();
                Effect::new(move || {
                    l.push([1]);
                })
            })
            .collect();
        assert_eq!(target.len(), 2);
        assert!(effects.iter().all(|e| e.run_count() == 1));
    }

    #[test]
    fn push_notifies_length_readers_once() {
        let (_target, list) = array(&[1]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (l, out) = (list.clone(), seen.clone());
        let _effect = Effect::new(move || out.borrow_mut().push(l.len()));

        assert_eq!(list.push([2, 3]), 3);
        assert_eq!(*seen.borrow(), vec![1, 3]);
    }

    #[test]
    fn pop_and_shift() {
        let (_target, list) = array(&[1, 2, 3]);
        assert_eq!(list.pop(), Value::from(3));
        assert_eq!(list.shift(), Value::from(1));
        assert_eq!(ints(list.to_vec()), vec![2]);
        list.pop();
        assert!(list.pop().is_undefined());
        assert!(list.is_empty());
    }

    #[test]
    fn unshift_moves_elements_up() {
        let (_target, list) = array(&[3, 4]);
        assert_eq!(list.unshift([1, 2]), 4);
        assert_eq!(ints(list.to_vec()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let (_target, list) = array(&[1, 2, 3, 4, 5]);
        let removed = list.splice(1, 2, [9]);
        assert_eq!(ints(removed), vec![2, 3]);
        assert_eq!(ints(list.to_vec()), vec![1, 9, 4, 5]);

        let removed = list.splice(1, 0, [7, 8]);
        assert!(removed.is_empty());
        assert_eq!(ints(list.to_vec()), vec![1, 7, 8, 9, 4, 5]);

        let removed = list.splice(4, 10, Vec::<Value>::new());
        assert_eq!(ints(removed), vec![4, 5]);
        assert_eq!(ints(list.to_vec()), vec![1, 7, 8, 9]);
    }

    #[test]
    fn shrinking_length_notifies_dropped_indices() {
        let (_target, list) = array(&[1, 2, 3]);
        let runs = Rc::new(Cell::new(0));
        let (l, r) = (list.clone(), runs.clone());
        let _effect = Effect::new(move || {
            l.get(2);
            r.set(r.get() + 1);
        });

        list.set_len(3);
        assert_eq!(runs.get(), 1);
        list.set_len(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn shrinking_length_spares_kept_indices() {
        let (_target, list) = array(&[1, 2, 3]);
        let runs = Rc::new(Cell::new(0));
        let (l, r) = (list.clone(), runs.clone());
        let _effect = Effect::new(move || {
            l.get(0);
            r.set(r.get() + 1);
        });

        list.set_len(1);
        assert_eq!(runs.get(), 1);
        assert_eq!(ints(list.to_vec()), vec![1]);
    }

    #[test]
    fn search_finds_raw_element_through_its_view() {
        let item = Target::record();
        let target = Target::array_from([Value::from(&item)]);
        let list = reactive(&target)
            .view()
            .and_then(|v| v.as_array())
            .expect("an array view");

        let wrapped = list.get(0);
        assert_eq!(wrapped, reactive(&item));
        assert!(list.includes(wrapped.clone()));
        assert_eq!(list.index_of(wrapped), Some(0));
        assert_eq!(list.last_index_of(&item), Some(0));
    }

    #[test]
    fn nan_is_included_but_has_no_index() {
        let target = Target::array_from([f64::NAN]);
        let list = reactive(&target)
            .view()
            .and_then(|v| v.as_array())
            .expect("an array view");
        assert!(list.includes(f64::NAN));
        assert_eq!(list.index_of(f64::NAN), None);
    }

    #[test]
    fn search_tracks_every_index() {
        let (target, list) = array(&[1, 2, 3]);
        let runs = Rc::new(Cell::new(0));
        let (l, r) = (list.clone(), runs.clone());
        let _effect = Effect::new(move || {
            l.includes(3);
            r.set(r.get() + 1);
        });
        assert_eq!(Runtime::observed_keys(&target), 4);
        list.set(1, 5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn readonly_arrays_reject_mutations() {
        let target = Target::array_from([1]);
        let list = readonly(&target)
            .view()
            .and_then(|v| v.as_array())
            .expect("an array view");
        assert_eq!(list.push([2]), 1);
        assert_eq!(list.pop(), Value::Undefined);
        assert_eq!(target.len(), 1);
    }
}
