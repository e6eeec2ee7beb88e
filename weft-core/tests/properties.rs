//! Property-based invariant tests for the reactive engine.
//!
//! These tests verify invariants that must hold for any sequence of writes:
//!
//! 1. Array mutations through a view agree with a plain `Vec` model.
//! 2. An effect reading derived state always ends up seeing the final state.
//! 3. Map writes through a view agree with an insertion-ordered model.
//! 4. Writing a value equal to the current one never re-runs a reader.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use proptest::prelude::*;
use weft_core::{batch, reactive, ArrayView, CollectionView, Effect, Target, Value};

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ArrayOp {
    Push(Vec<i64>),
    Pop,
    Shift,
    Unshift(Vec<i64>),
    Splice(usize, usize, Vec<i64>),
    Set(usize, i64),
    SetLen(usize),
}

fn items() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(-50i64..50, 0..4)
}

fn array_op() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        items().prop_map(ArrayOp::Push),
        Just(ArrayOp::Pop),
        Just(ArrayOp::Shift),
        items().prop_map(ArrayOp::Unshift),
        (0usize..8, 0usize..4, items()).prop_map(|(s, d, i)| ArrayOp::Splice(s, d, i)),
        (0usize..10, -50i64..50).prop_map(|(i, v)| ArrayOp::Set(i, v)),
        (0usize..10).prop_map(ArrayOp::SetLen),
    ]
}

fn apply_model(model: &mut Vec<Option<i64>>, op: &ArrayOp) {
    match op {
        ArrayOp::Push(values) => model.extend(values.iter().copied().map(Some)),
        ArrayOp::Pop => {
            model.pop();
        }
        ArrayOp::Shift => {
            if !model.is_empty() {
                model.remove(0);
            }
        }
        ArrayOp::Unshift(values) => {
            model.splice(0..0, values.iter().copied().map(Some));
        }
        ArrayOp::Splice(start, delete, values) => {
            let start = (*start).min(model.len());
            let end = start + (*delete).min(model.len() - start);
            model.splice(start..end, values.iter().copied().map(Some));
        }
        ArrayOp::Set(index, value) => {
            if *index >= model.len() {
                model.resize(index + 1, None);
            }
            model[*index] = Some(*value);
        }
        ArrayOp::SetLen(len) => model.resize(*len, None),
    }
}

fn apply_view(list: &ArrayView, op: &ArrayOp) {
    match op {
        ArrayOp::Push(values) => {
            list.push(values.iter().copied());
        }
        ArrayOp::Pop => {
            list.pop();
        }
        ArrayOp::Shift => {
            list.shift();
        }
        ArrayOp::Unshift(values) => {
            list.unshift(values.iter().copied());
        }
        ArrayOp::Splice(start, delete, values) => {
            list.splice(*start, *delete, values.iter().copied());
        }
        ArrayOp::Set(index, value) => {
            list.set(*index, *value);
        }
        ArrayOp::SetLen(len) => {
            list.set_len(*len);
        }
    }
}

fn snapshot(values: Vec<Value>) -> Vec<Option<i64>> {
    values.iter().map(Value::as_int).collect()
}

fn array_view(target: &Target) -> ArrayView {
    reactive(target)
        .view()
        .and_then(|view| view.as_array())
        .expect("an array view")
}

fn map_view(target: &Target) -> CollectionView {
    reactive(target)
        .view()
        .and_then(|view| view.as_collection())
        .expect("a collection view")
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Array mutations agree with a Vec model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn array_view_matches_vec_model(
        initial in items(),
        ops in proptest::collection::vec(array_op(), 0..24),
    ) {
        let target = Target::array_from(initial.iter().copied());
        let list = array_view(&target);
        let mut model: Vec<Option<i64>> = initial.iter().copied().map(Some).collect();

        for op in &ops {
            apply_view(&list, op);
            apply_model(&mut model, op);
            prop_assert_eq!(snapshot(target.to_vec()), model.clone(), "after {:?}", op);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Readers converge on the final state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn length_reader_sees_final_length(
        ops in proptest::collection::vec(array_op(), 0..24),
        batched in any::<bool>(),
    ) {
        let target = Target::array();
        let list = array_view(&target);
        let seen = Rc::new(Cell::new(usize::MAX));

        let (reader, out) = (list.clone(), seen.clone());
        let _effect = Effect::new(move || out.set(reader.len()));

        if batched {
            batch(|| ops.iter().for_each(|op| apply_view(&list, op)));
        } else {
            ops.iter().for_each(|op| apply_view(&list, op));
        }
        prop_assert_eq!(seen.get(), target.len());
    }

    #[test]
    fn record_sum_reader_sees_final_sum(
        writes in proptest::collection::vec((0usize..4, -20i64..20), 0..32),
    ) {
        const KEYS: [&str; 4] = ["a", "b", "c", "d"];
        let state = reactive(Target::record_from(KEYS.iter().map(|k| (*k, 0))))
            .view()
            .expect("a record view");
        let seen = Rc::new(Cell::new(i64::MIN));

        let (reader, out) = (state.clone(), seen.clone());
        let _effect = Effect::new(move || {
            let sum = KEYS
                .iter()
                .filter_map(|k| reader.get(*k).as_int())
                .sum::<i64>();
            out.set(sum);
        });

        let mut model = [0i64; 4];
        for (key, value) in &writes {
            state.set(KEYS[*key], *value);
            model[*key] = *value;
        }
        prop_assert_eq!(seen.get(), model.iter().sum::<i64>());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Map writes agree with an ordered model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn map_view_matches_ordered_model(
        ops in proptest::collection::vec((0i64..6, proptest::option::of(-9i64..9)), 0..32),
    ) {
        let target = Target::map();
        let map = map_view(&target);
        let sizes = Rc::new(RefCell::new(Vec::new()));

        let (reader, out) = (map.clone(), sizes.clone());
        let _effect = Effect::new(move || out.borrow_mut().push(reader.size()));

        let mut model: IndexMap<i64, i64> = IndexMap::new();
        for (key, value) in &ops {
            match value {
                Some(value) => {
                    map.set(*key, *value);
                    model.insert(*key, *value);
                }
                None => {
                    let removed = map.delete(*key);
                    prop_assert_eq!(removed, model.shift_remove(key).is_some());
                }
            }
        }

        let entries: Vec<(i64, i64)> = map
            .entries()
            .filter_map(|(k, v)| Some((k.as_int()?, v.as_int()?)))
            .collect();
        let expected: Vec<(i64, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(entries, expected);
        prop_assert_eq!(sizes.borrow().last().copied(), Some(model.len()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Same-value writes are silent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn same_value_writes_never_rerun(value in -100i64..100, repeats in 1usize..8) {
        let state = reactive(Target::record_from([("v", value)]))
            .view()
            .expect("a record view");
        let runs = Rc::new(Cell::new(0));

        let (reader, count) = (state.clone(), runs.clone());
        let _effect = Effect::new(move || {
            reader.get("v");
            count.set(count.get() + 1);
        });

        for _ in 0..repeats {
            state.set("v", value);
            state.set("v", value as f64);
        }
        prop_assert_eq!(runs.get(), 1);
    }
}
