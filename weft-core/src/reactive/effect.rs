//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever something it read
//! changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless lazy)
//!    to establish its initial dependencies.
//!
//! 2. Each run records the Deps the function reads. Deps read in the previous
//!    run but not in this one are unsubscribed when the run finishes, so the
//!    dependency set always matches the last run.
//!
//! 3. When a dependency changes, the effect's dirty level rises. An effect
//!    that was clean is handed to its scheduler once; the default scheduler
//!    re-runs it if it is still dirty when the job is processed.
//!
//! 4. A `Pending` effect only read memos that might have changed. Before
//!    re-running it refreshes those memos; if none of them actually changed
//!    value the effect goes back to clean without running.
//!
//! # Ownership
//!
//! Deps hold effects weakly. An effect stays alive while any [`Effect`]
//! handle to it (or the [`super::EffectScope`] it was created in) is alive.
//! Dropping the last handle unsubscribes it everywhere.
//!
//! # Re-entrancy
//!
//! While an effect runs it does not schedule itself in response to its own
//! writes unless `allow_recurse` is set. With it set, a self-triggered run
//! happens nested inside the current one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::{ReactiveContext, TrackingPause};
use super::memo::WeakMemo;
use super::runtime::DebugEvent;
use super::subscriber::{DirtyLevel, SubscriberId};
use crate::graph::dep::{Dep, DepId};
use crate::graph::scheduler;

/// Custom scheduler: receives the effect instead of it being re-run.
pub type SchedulerFn = Rc<dyn Fn(&Effect)>;

/// Debug hook fired on track or trigger.
pub type DebugHook = Rc<dyn Fn(&DebugEvent)>;

/// Options for [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Replace the default re-run with a custom job.
    pub scheduler: Option<SchedulerFn>,
    /// Let the effect schedule itself from its own writes.
    pub allow_recurse: bool,
    /// Called each time a new dependency is recorded.
    pub on_track: Option<DebugHook>,
    /// Called each time a dependency change schedules the effect.
    pub on_trigger: Option<DebugHook>,
    /// Called once when the effect is disposed.
    pub on_stop: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .finish_non_exhaustive()
    }
}

enum Scheduling {
    /// Re-run when processed, if still dirty.
    Rerun,
    Custom(SchedulerFn),
    /// Never queued; the owner pulls (memos).
    Detached,
}

struct EffectInner {
    id: SubscriberId,
    func: Option<Rc<dyn Fn()>>,
    deps: RefCell<IndexMap<DepId, Dep>>,
    /// Deps from the previous run not yet re-read in the current one.
    stale: RefCell<IndexMap<DepId, Dep>>,
    dirty: Cell<DirtyLevel>,
    should_schedule: Cell<bool>,
    running: Cell<u32>,
    active: Cell<bool>,
    run_count: Cell<usize>,
    scheduling: Scheduling,
    allow_recurse: bool,
    on_track: Option<DebugHook>,
    on_trigger: Option<DebugHook>,
    on_stop: Option<Rc<dyn Fn()>>,
    computed: Option<WeakMemo>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        let deps = std::mem::take(self.deps.get_mut());
        let stale = std::mem::take(self.stale.get_mut());
        for dep in deps.values().chain(stale.values()) {
            dep.remove(self.id);
        }
    }
}

/// A computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use weft_core::{reactive, Effect, Target};
///
/// let state = reactive(Target::record_from([("count", 0)]));
/// let state = state.as_reactive().unwrap().clone();
///
/// let seen = std::rc::Rc::new(std::cell::Cell::new(0));
/// let sink = seen.clone();
/// let watched = state.clone();
/// let _effect = Effect::new(move || {
///     sink.set(watched.get("count").as_int().unwrap_or(0));
/// });
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Effect(Rc<EffectInner>);

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(f, EffectOptions::default())
    }

    /// Create an effect without running it.
    pub fn new_lazy<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(
            f,
            EffectOptions {
                lazy: true,
                ..EffectOptions::default()
            },
        )
    }

    pub fn with_options<F>(f: F, options: EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let scheduling = match options.scheduler {
            Some(scheduler) => Scheduling::Custom(scheduler),
            None => Scheduling::Rerun,
        };
        let effect = Self::build(
            Some(Rc::new(f)),
            scheduling,
            options.allow_recurse,
            (options.on_track, options.on_trigger, options.on_stop),
            None,
        );
        super::scope::record(&effect);
        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// The tracking half of a memo: never queued, notifies `computed`'s
    /// dependents instead.
    pub(crate) fn detached(computed: WeakMemo) -> Self {
        let effect = Self::build(None, Scheduling::Detached, false, (None, None, None), Some(computed));
        super::scope::record(&effect);
        effect
    }

    fn build(
        func: Option<Rc<dyn Fn()>>,
        scheduling: Scheduling,
        allow_recurse: bool,
        hooks: (Option<DebugHook>, Option<DebugHook>, Option<Rc<dyn Fn()>>),
        computed: Option<WeakMemo>,
    ) -> Self {
        let (on_track, on_trigger, on_stop) = hooks;
        Self(Rc::new(EffectInner {
            id: SubscriberId::new(),
            func,
            deps: RefCell::new(IndexMap::new()),
            stale: RefCell::new(IndexMap::new()),
            // Never run, so never up to date.
            dirty: Cell::new(DirtyLevel::Dirty),
            should_schedule: Cell::new(false),
            running: Cell::new(0),
            active: Cell::new(true),
            run_count: Cell::new(0),
            scheduling,
            allow_recurse,
            on_track,
            on_trigger,
            on_stop,
            computed,
        }))
    }

    /// Get the subscriber ID of this effect.
    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    /// Run the effect function, re-recording its dependencies.
    ///
    /// Does nothing once disposed. A run started from inside the current run
    /// nests: its reads are added to the current run's dependencies.
    pub fn run(&self) {
        if self.is_disposed() {
            return;
        }
        if let Some(func) = self.0.func.clone() {
            run_tracked(self, || func());
        }
    }

    /// Whether the effect must re-run.
    ///
    /// A `Pending` effect refreshes the memos it read, in read order, until
    /// one of them reports a changed value. If none does it becomes clean.
    pub fn is_dirty(&self) -> bool {
        if self.0.dirty.get() == DirtyLevel::Pending {
            let _pause = TrackingPause::new();
            let deps: Vec<Dep> = self.0.deps.borrow().values().cloned().collect();
            for dep in deps {
                if let Some(memo) = dep.computed() {
                    memo.refresh();
                    if self.0.dirty.get() == DirtyLevel::Dirty {
                        break;
                    }
                }
            }
            if self.0.dirty.get() == DirtyLevel::Pending {
                self.0.dirty.set(DirtyLevel::Clean);
            }
        }
        self.0.dirty.get() >= DirtyLevel::Dirty
    }

    pub fn dirty_level(&self) -> DirtyLevel {
        self.0.dirty.get()
    }

    /// Whether the effect is currently inside its own run.
    pub fn is_running(&self) -> bool {
        self.0.running.get() > 0
    }

    /// Stop the effect: unsubscribe it everywhere and never run it again.
    pub fn dispose(&self) {
        if !self.0.active.replace(false) {
            return;
        }
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        let stale = std::mem::take(&mut *self.0.stale.borrow_mut());
        for dep in deps.values().chain(stale.values()) {
            dep.remove(self.0.id);
        }
        if let Some(on_stop) = &self.0.on_stop {
            on_stop();
        }
        tracing::debug!(effect = ?self.0.id, "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.0.active.get()
    }

    /// Get the number of completed runs.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Get the number of dependencies recorded by the last run.
    pub fn dependency_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect(Rc::downgrade(&self.0))
    }

    /// Whether `dep` was recorded by the current (or last) run.
    pub(crate) fn tracks(&self, dep: DepId) -> bool {
        self.0.deps.borrow().contains_key(&dep)
    }

    /// Record `dep` as read by the current run.
    pub(crate) fn track_dep(&self, dep: &Dep, event: impl FnOnce() -> DebugEvent) {
        let id = dep.id();
        if self.0.deps.borrow().contains_key(&id) {
            return;
        }
        self.0.deps.borrow_mut().insert(id, dep.clone());
        let carried = self.0.stale.borrow_mut().swap_remove(&id);
        if carried.is_none() {
            dep.add(self);
        }
        if let Some(on_track) = &self.0.on_track {
            on_track(&event());
        }
    }

    /// React to a change of one of this effect's dependencies.
    pub(crate) fn notify(&self, level: DirtyLevel, event: Option<&DebugEvent>) {
        let inner = &self.0;
        let current = inner.dirty.get();
        if current < level {
            if current == DirtyLevel::Clean {
                inner.should_schedule.set(true);
            }
            inner.dirty.set(level);
        }
        if !inner.should_schedule.get() {
            return;
        }
        if let (Some(on_trigger), Some(event)) = (&inner.on_trigger, event) {
            on_trigger(event);
        }
        if let Some(memo) = inner.computed.as_ref().and_then(WeakMemo::upgrade) {
            memo.notify_dependents(DirtyLevel::Pending);
        }
        if inner.running.get() == 0 || inner.allow_recurse {
            inner.should_schedule.set(false);
            if !matches!(inner.scheduling, Scheduling::Detached) {
                scheduler::enqueue(self.clone());
            }
        }
    }

    /// Process a queued job for this effect.
    pub(crate) fn run_scheduled(&self) {
        if self.is_disposed() {
            return;
        }
        match &self.0.scheduling {
            Scheduling::Rerun => {
                if self.is_dirty() {
                    self.run();
                }
            }
            Scheduling::Custom(scheduler) => scheduler(self),
            Scheduling::Detached => {}
        }
    }

    fn begin_run(&self) -> bool {
        let inner = &self.0;
        inner.dirty.set(DirtyLevel::Clean);
        let outermost = inner.running.get() == 0;
        inner.running.set(inner.running.get() + 1);
        if outermost {
            let previous = std::mem::take(&mut *inner.deps.borrow_mut());
            *inner.stale.borrow_mut() = previous;
        }
        outermost
    }

    fn end_run(&self, outermost: bool) {
        let inner = &self.0;
        inner.running.set(inner.running.get().saturating_sub(1));
        inner.run_count.set(inner.run_count.get() + 1);
        if outermost {
            let stale = std::mem::take(&mut *inner.stale.borrow_mut());
            for dep in stale.values() {
                dep.remove(inner.id);
            }
        }
    }
}

/// Run `f` as a tracked run of `effect`: reads inside `f` become the
/// effect's dependencies, replacing those of its previous run.
///
/// A disposed effect runs `f` as a plain call: nothing is recorded against
/// it, and reads still reach whichever computation is currently active.
pub fn run_tracked<R>(effect: &Effect, f: impl FnOnce() -> R) -> R {
    if effect.is_disposed() {
        effect.0.dirty.set(DirtyLevel::Clean);
        return f();
    }
    let outermost = effect.begin_run();
    let _run = RunGuard { effect, outermost };
    let _ctx = ReactiveContext::enter(effect);
    f()
}

/// Finishes a run even if the function panics.
struct RunGuard<'a> {
    effect: &'a Effect,
    outermost: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.effect.end_run(self.outermost);
    }
}

/// Non-owning handle held by Deps.
#[derive(Clone)]
pub(crate) struct WeakEffect(Weak<EffectInner>);

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<Effect> {
        self.0.upgrade().map(Effect)
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.0.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("dirty", &self.0.dirty.get())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn counter() -> (Rc<Cell<i32>>, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new_lazy(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let (run_count, run_count_clone) = counter();
        let signal = Signal::new(1);
        let source = signal.clone();

        let effect = Effect::new(move || {
            source.get();
            run_count_clone.set(run_count_clone.get() + 1);
        });
        assert_eq!(effect.dependency_count(), 1);

        signal.set(2);
        assert_eq!(run_count.get(), 2);

        // Same value: no notification.
        signal.set(2);
        assert_eq!(run_count.get(), 2);
    }

    #[test]
    fn disposed_run_reports_reads_to_enclosing_effect() {
        let (run_count, run_count_clone) = counter();
        let signal = Signal::new(1);
        let source = signal.clone();

        let disposed = Effect::new_lazy(|| {});
        disposed.dispose();
        let inner = disposed.clone();
        let outer = Effect::new(move || {
            run_tracked(&inner, || source.get());
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(disposed.dependency_count(), 0);
        assert_eq!(outer.dependency_count(), 1);
        signal.set(2);
        assert_eq!(run_count.get(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let (run_count, run_count_clone) = counter();
        let signal = Signal::new(0);
        let source = signal.clone();

        let effect = Effect::new(move || {
            source.get();
            run_count_clone.set(run_count_clone.get() + 1);
        });
        assert_eq!(run_count.get(), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(effect.dependency_count(), 0);

        signal.set(1);
        assert_eq!(run_count.get(), 1);

        effect.run();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn dropping_last_handle_unsubscribes() {
        let (run_count, run_count_clone) = counter();
        let signal = Signal::new(0);
        let source = signal.clone();

        let effect = Effect::new(move || {
            source.get();
            run_count_clone.set(run_count_clone.get() + 1);
        });
        assert_eq!(signal.subscriber_count(), 1);

        drop(effect);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_tracks_run_count() {
        let effect = Effect::new(|| {});

        assert_eq!(effect.run_count(), 1);

        effect.run();
        assert_eq!(effect.run_count(), 2);

        effect.run();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect1, effect2);

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn custom_scheduler_receives_effect() {
        let scheduled = Rc::new(Cell::new(0));
        let scheduled_clone = scheduled.clone();
        let signal = Signal::new(0);
        let source = signal.clone();

        let effect = Effect::with_options(
            move || {
                source.get();
            },
            EffectOptions {
                scheduler: Some(Rc::new(move |_: &Effect| {
                    scheduled_clone.set(scheduled_clone.get() + 1);
                })),
                ..EffectOptions::default()
            },
        );

        signal.set(1);
        assert_eq!(scheduled.get(), 1);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.dirty_level(), DirtyLevel::Dirty);

        // Already dirty: further writes do not schedule again until it runs.
        signal.set(2);
        assert_eq!(scheduled.get(), 1);

        effect.run();
        signal.set(3);
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn stop_hook_fires_once() {
        let stopped = Rc::new(Cell::new(0));
        let stopped_clone = stopped.clone();
        let effect = Effect::with_options(
            || {},
            EffectOptions {
                on_stop: Some(Rc::new(move || stopped_clone.set(stopped_clone.get() + 1))),
                ..EffectOptions::default()
            },
        );
        effect.dispose();
        effect.dispose();
        assert_eq!(stopped.get(), 1);
    }

    #[test]
    fn self_write_does_not_recurse_by_default() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            let next = source.get().as_int().unwrap_or(0) + 1;
            if next < 10 {
                source.set(next);
            }
        });
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.get_untracked(), crate::Value::from(1));
    }

    #[test]
    fn allow_recurse_reruns_on_self_write() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::with_options(
            move || {
                let next = source.get().as_int().unwrap_or(0) + 1;
                if next < 5 {
                    source.set(next);
                }
            },
            EffectOptions {
                allow_recurse: true,
                ..EffectOptions::default()
            },
        );
        // Runs nest: each run's write re-runs it until it stops writing.
        assert_eq!(signal.get_untracked(), crate::Value::from(4));
        assert_eq!(effect.run_count(), 5);
    }
}
