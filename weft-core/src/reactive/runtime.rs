//! Reactive Runtime
//!
//! The runtime connects reads and writes on observed targets to the
//! computations that depend on them.
//!
//! # How It Works
//!
//! 1. When a computation reads a key of an observed target, [`Runtime::track`]
//!    records a dependency on (target, key). Enumerations are recorded on the
//!    sentinel keys [`Key::Iterate`] and [`Key::MapKeyIterate`]; reading an
//!    array's length as part of enumeration uses [`Key::Length`].
//!
//! 2. When a write lands, [`Runtime::trigger`] selects the affected Deps:
//!    a. `Clear` affects every observed key of the target
//!    b. setting an array's length affects `Length` and every index at or past
//!       the new length
//!    c. otherwise the written key, plus the enumeration keys whose result the
//!       operation changes (see [`TriggerOp`])
//!
//! 3. All selected Deps are notified under one scheduling pause, so each
//!    affected computation runs at most once per write.

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{DirtyLevel, SubscriberId};
use crate::graph::dep::Dep;
use crate::graph::registry;
use crate::graph::scheduler::{SchedulingPause, UpdateScheduler};
use crate::value::{Key, Target, TargetId, TargetKind, Value};

/// Kind of read being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being announced.
///
/// - `Set` replaces an existing key. On maps it also changes what iterating
///   the values yields.
/// - `Add` creates a key: it changes the enumeration of records, maps and
///   sets, and the length of arrays.
/// - `Delete` removes a key and changes the enumeration.
/// - `Clear` empties a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Payload handed to `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebugEvent {
    /// The observed target, or `None` for reactive cells.
    pub target: Option<TargetId>,
    pub op: DebugOp,
    pub key: Option<Key>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Entries of a collection before it was cleared.
    pub old_target: Option<Vec<(Value, Value)>>,
}

impl DebugEvent {
    /// An event on a reactive cell.
    pub fn cell(op: DebugOp) -> Self {
        Self {
            target: None,
            op,
            key: None,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }
}

/// Description of one write, as handed to [`Runtime::trigger`].
#[derive(Debug, Clone)]
pub struct Trigger {
    pub op: TriggerOp,
    pub key: Option<Key>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub old_target: Option<Vec<(Value, Value)>>,
}

impl Trigger {
    pub fn new(op: TriggerOp, key: Option<Key>) -> Self {
        Self {
            op,
            key,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub fn with_new(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_old(mut self, value: Option<Value>) -> Self {
        self.old_value = value;
        self
    }

    pub fn with_old_target(mut self, entries: Option<Vec<(Value, Value)>>) -> Self {
        self.old_target = entries;
        self
    }
}

/// The per-thread reactive runtime.
///
/// All state lives in thread-locals; this type only groups the entry points.
pub struct Runtime;

impl Runtime {
    /// Record that the active computation read `key` of `target`.
    ///
    /// Does nothing when no computation is running or tracking is paused.
    pub fn track(target: &Target, op: TrackOp, key: Key) {
        if !ReactiveContext::should_track() {
            return;
        }
        let Some(effect) = ReactiveContext::active_effect() else {
            return;
        };
        registry::sweep();
        let dep = registry::dep_for(target.id(), &key);
        effect.track_dep(&dep, || DebugEvent {
            target: Some(target.id()),
            op: DebugOp::Track(op),
            key: Some(key.clone()),
            new_value: None,
            old_value: None,
            old_target: None,
        });
    }

    /// Notify every computation affected by a write to `target`.
    pub fn trigger(target: &Target, trigger: Trigger) {
        registry::sweep();
        let kind = target.kind();
        let deps = registry::select(target.id(), |deps| select_deps(deps, kind, &trigger));
        if deps.is_empty() {
            return;
        }
        tracing::trace!(
            target = ?target.id(),
            op = ?trigger.op,
            key = ?trigger.key,
            deps = deps.len(),
            "trigger"
        );

        let event = DebugEvent {
            target: Some(target.id()),
            op: DebugOp::Trigger(trigger.op),
            key: trigger.key,
            new_value: trigger.new_value,
            old_value: trigger.old_value,
            old_target: trigger.old_target,
        };
        let _pause = SchedulingPause::new();
        for dep in &deps {
            dep.notify(DirtyLevel::Dirty, Some(&event));
        }
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check whether reads are currently being recorded.
    pub fn is_tracking() -> bool {
        ReactiveContext::should_track()
    }

    /// Number of computations subscribed to (`target`, `key`).
    pub fn subscriber_count(target: &Target, key: &Key) -> usize {
        registry::subscriber_count(target, key)
    }

    /// Number of observed keys on `target`.
    pub fn observed_keys(target: &Target) -> usize {
        registry::key_count(target)
    }

    /// Number of targets with at least one observed key.
    pub fn observed_targets() -> usize {
        registry::target_count()
    }

    /// Number of computations waiting for scheduling to resume.
    pub fn pending_jobs() -> usize {
        UpdateScheduler::pending()
    }

    /// Discard all engine state of the current thread: subscriptions, view
    /// caches, queued jobs, pause depths, scopes and configuration.
    ///
    /// Live effects stay alive but lose their subscriptions.
    pub fn reset() {
        UpdateScheduler::reset();
        ReactiveContext::reset();
        super::scope::reset();
        registry::reset();
        crate::proxy::cache::reset();
        crate::config::reset();
        tracing::debug!("reactive runtime reset");
    }
}

fn select_deps(
    deps: &indexmap::IndexMap<Key, Dep>,
    kind: TargetKind,
    trigger: &Trigger,
) -> SmallVec<[Dep; 4]> {
    if trigger.op == TriggerOp::Clear {
        return deps.values().cloned().collect();
    }

    let new_length = match (kind, &trigger.key) {
        (TargetKind::Array, Some(Key::Length)) => trigger
            .new_value
            .as_ref()
            .and_then(Value::as_int)
            .map(|len| len.max(0) as usize),
        _ => None,
    };
    if let Some(new_length) = new_length {
        return deps
            .iter()
            .filter(|(key, _)| match key {
                Key::Length => true,
                Key::Index(index) => *index >= new_length,
                _ => false,
            })
            .map(|(_, dep)| dep.clone())
            .collect();
    }

    let mut selected = SmallVec::new();
    let mut push = |key: &Key| {
        if let Some(dep) = deps.get(key) {
            selected.push(dep.clone());
        }
    };
    if let Some(key) = &trigger.key {
        push(key);
    }
    match (trigger.op, kind) {
        (TriggerOp::Add, TargetKind::Array) => {
            if matches!(trigger.key, Some(Key::Index(_))) {
                push(&Key::Length);
            }
        }
        (TriggerOp::Add | TriggerOp::Delete, TargetKind::Map) => {
            push(&Key::Iterate);
            push(&Key::MapKeyIterate);
        }
        (TriggerOp::Add | TriggerOp::Delete, TargetKind::Record | TargetKind::Set) => {
            push(&Key::Iterate);
        }
        (TriggerOp::Set, TargetKind::Map) => push(&Key::Iterate),
        _ => {}
    }
    selected
}
