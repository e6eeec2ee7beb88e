//! Integration Tests for the Reactive System
//!
//! These tests verify that views, cells, memos and effects work together
//! through the public API only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_core::reactive::{DebugEvent, DebugOp, DirtyLevel, EffectOptions, TriggerOp};
use weft_core::{
    batch, is_reactive, is_readonly, reactive, readonly, to_raw, Effect, EffectScope, Key, Memo,
    Reactive, Runtime, Signal, Target, Value,
};

fn view(value: Value) -> Reactive {
    value.view().expect("a wrapped view")
}

fn int(value: Value) -> i64 {
    value.as_int().unwrap_or_default()
}

/// Wrapping the same target twice yields the same view, and unwrapping it
/// yields the original target.
#[test]
fn identity_is_stable() {
    let target = Target::record();
    let a = reactive(&target);
    let b = reactive(&target);
    assert_eq!(a, b);
    assert_eq!(to_raw(&a), Value::from(&target));

    let ro = readonly(a.clone());
    assert!(is_readonly(&ro));
    assert!(is_reactive(&ro));
    assert_eq!(readonly(a), ro);
}

/// Test that a memo tracks signal dependency automatically.
#[test]
fn memo_tracks_signal_dependency() {
    let signal = Signal::new(10);

    let signal_clone = signal.clone();
    let memo = Memo::new(move || int(signal_clone.get()) * 2);

    // First access computes the value
    assert_eq!(memo.get(), Value::from(20));

    // No manual invalidation needed
    signal.set(5);
    assert_eq!(memo.get(), Value::from(10));
}

/// Test that an effect re-runs when a signal it read changes.
#[test]
fn effect_tracks_signal_dependency() {
    let signal = Signal::new(0);
    let observed = Rc::new(Cell::new(-1));
    let observed_clone = observed.clone();

    let signal_clone = signal.clone();
    let _effect = Effect::new(move || {
        observed_clone.set(int(signal_clone.get()));
    });

    // Effect runs on creation, captures initial value
    assert_eq!(observed.get(), 0);

    signal.set(42);
    assert_eq!(observed.get(), 42);
}

/// Test that memos cache values correctly.
#[test]
fn memo_caches_expensive_computation() {
    let compute_count = Rc::new(Cell::new(0));
    let compute_clone = compute_count.clone();

    let memo = Memo::new(move || {
        compute_clone.set(compute_clone.get() + 1);
        42
    });

    // Nothing runs until the first read
    assert_eq!(compute_count.get(), 0);
    assert!(!memo.has_value());

    assert_eq!(memo.get(), Value::from(42));
    assert_eq!(memo.get(), Value::from(42));
    assert_eq!(memo.get(), Value::from(42));
    assert_eq!(compute_count.get(), 1);
}

/// Test that memos can depend on other memos.
#[test]
fn memo_depends_on_memo() {
    let base = Signal::new(5);

    let base_clone = base.clone();
    let doubled = Memo::new(move || int(base_clone.get()) * 2);

    let doubled_clone = doubled.clone();
    let plus_ten = Memo::new(move || int(doubled_clone.get()) + 10);

    assert_eq!(doubled.get(), Value::from(10));
    assert_eq!(plus_ten.get(), Value::from(20));

    base.set(10);

    assert_eq!(plus_ten.get(), Value::from(30));
    assert_eq!(doubled.get(), Value::from(20));
}

/// An effect behind a memo only re-runs when the memo's value changes.
#[test]
fn unchanged_memo_does_not_rerun_effect() {
    let number = Signal::new(2);
    let number_clone = number.clone();
    let parity = Memo::new(move || int(number_clone.get()) % 2);

    let runs = Rc::new(Cell::new(0));
    let (p, r) = (parity.clone(), runs.clone());
    let _effect = Effect::new(move || {
        p.get();
        r.set(r.get() + 1);
    });

    number.set(4);
    assert_eq!(runs.get(), 1);
    assert_eq!(parity.state(), DirtyLevel::Clean);

    number.set(5);
    assert_eq!(runs.get(), 2);
}

/// Test effect disposal stops execution.
#[test]
fn disposed_effect_does_not_run() {
    let state = view(reactive(Target::record_from([("n", 0)])));
    let run_count = Rc::new(Cell::new(0));

    let (s, r) = (state.clone(), run_count.clone());
    let effect = Effect::new(move || {
        s.get("n");
        r.set(r.get() + 1);
    });
    assert_eq!(run_count.get(), 1);

    effect.dispose();
    assert_eq!(effect.dependency_count(), 0);

    state.set("n", 1);
    state.set("n", 2);
    assert_eq!(run_count.get(), 1);
}

/// Dropping a target removes every dependency recorded on it.
#[test]
fn dropped_target_is_pruned_from_registry() {
    let before = Runtime::observed_targets();
    let target = Target::record_from([("a", 1)]);
    let state = view(reactive(&target));
    let s = state.clone();
    let effect = Effect::new(move || {
        s.get("a");
    });
    assert_eq!(Runtime::observed_targets(), before + 1);

    drop((effect, state, target));
    assert_eq!(Runtime::observed_targets(), before);
}

/// Every affected computation runs once per batch.
#[test]
fn batch_runs_each_effect_once() {
    let state = view(reactive(Target::record_from([("a", 0), ("b", 0)])));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, out) = (state.clone(), seen.clone());
    let _effect = Effect::new(move || {
        out.borrow_mut()
            .push(int(s.get("a")) + int(s.get("b")));
    });

    batch(|| {
        state.set("a", 1);
        state.set("b", 2);
        state.set("a", 3);
        assert_eq!(Runtime::pending_jobs(), 1);
    });
    assert_eq!(*seen.borrow(), vec![0, 5]);
}

/// A custom scheduler receives the effect instead of it re-running.
#[test]
fn custom_scheduler_defers_runs() {
    let signal = Signal::new(1);
    let queued: Rc<RefCell<Vec<Effect>>> = Rc::new(RefCell::new(Vec::new()));

    let queue = queued.clone();
    let source = signal.clone();
    let effect = Effect::with_options(
        move || {
            source.get();
        },
        EffectOptions {
            scheduler: Some(Rc::new(move |effect: &Effect| {
                queue.borrow_mut().push(effect.clone())
            })),
            ..EffectOptions::default()
        },
    );
    assert_eq!(effect.run_count(), 1);

    signal.set(2);
    signal.set(3);
    assert_eq!(effect.run_count(), 1);
    assert_eq!(queued.borrow().len(), 1);

    let pending = queued.borrow_mut().pop();
    if let Some(job) = pending {
        job.run();
    }
    assert_eq!(effect.run_count(), 2);
}

/// Debugger hooks see every read and every write that reaches the effect.
#[test]
fn debugger_hooks_receive_events() {
    let target = Target::record_from([("a", 1)]);
    let state = view(reactive(&target));
    let tracked = Rc::new(RefCell::new(Vec::new()));
    let triggered = Rc::new(RefCell::new(Vec::new()));

    let (on_track, on_trigger) = (tracked.clone(), triggered.clone());
    let s = state.clone();
    let _effect = Effect::with_options(
        move || {
            s.get("a");
        },
        EffectOptions {
            on_track: Some(Rc::new(move |event: &DebugEvent| {
                on_track.borrow_mut().push(event.key.clone())
            })),
            on_trigger: Some(Rc::new(move |event: &DebugEvent| {
                on_trigger.borrow_mut().push((event.op, event.old_value.clone()))
            })),
            ..EffectOptions::default()
        },
    );
    assert_eq!(*tracked.borrow(), vec![Some(Key::from("a"))]);

    state.set("a", 2);
    assert_eq!(triggered.borrow().len(), 1);
    let (op, old) = triggered.borrow()[0].clone();
    assert_eq!(op, DebugOp::Trigger(TriggerOp::Set));
    assert_eq!(old, Some(Value::from(1)));
}

/// Stopping a scope disposes everything created inside it.
#[test]
fn scope_stop_disposes_views_effects() {
    let state = view(reactive(Target::record_from([("n", 0)])));
    let runs = Rc::new(Cell::new(0));
    let scope = EffectScope::new();

    let (s, r) = (state.clone(), runs.clone());
    scope.run(move || {
        Effect::new(move || {
            s.get("n");
            r.set(r.get() + 1);
        });
    });

    state.set("n", 1);
    assert_eq!(runs.get(), 2);

    scope.stop();
    state.set("n", 2);
    assert_eq!(runs.get(), 2);
}

/// A signal holding a container hands out the wrapped view.
#[test]
fn signal_wraps_containers() {
    let list = Target::array_from([1, 2]);
    let signal = Signal::new(&list);
    assert_eq!(signal.get(), reactive(&list));

    let shallow = Signal::shallow(&list);
    assert_eq!(shallow.get(), Value::from(&list));
}

/// Writes through a nested view reach computations reading the nested view
/// through its parent.
#[test]
fn nested_writes_reach_parent_readers() {
    let inner = Target::record_from([("x", 1)]);
    let outer = Target::record_from([("inner", Value::from(&inner))]);
    let state = view(reactive(&outer));
    let seen = Rc::new(Cell::new(0));

    let (s, out) = (state.clone(), seen.clone());
    let _effect = Effect::new(move || {
        let nested = s.get("inner").view().map(|v| int(v.get("x")));
        out.set(nested.unwrap_or_default());
    });

    view(reactive(&inner)).set("x", 7);
    assert_eq!(seen.get(), 7);
}
