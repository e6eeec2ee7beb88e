//! Subscriber sets.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::graph::scheduler::SchedulingPause;
use crate::reactive::{DebugEvent, DirtyLevel, Effect, Memo, ReactiveContext, SubscriberId, WeakEffect, WeakMemo};

/// Counter for generating unique dep IDs.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a subscriber set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

type Cleanup = Box<dyn Fn(&Dep)>;

struct DepInner {
    id: DepId,
    /// Ordered so notification follows subscription order.
    subscribers: RefCell<IndexMap<SubscriberId, WeakEffect>>,
    /// Removes this dep from its owner once it is empty.
    cleanup: Option<Cleanup>,
    /// The memo whose value this dep tracks, if any.
    computed: Option<WeakMemo>,
}

/// The set of computations depending on one observed location.
#[derive(Clone)]
pub(crate) struct Dep(Rc<DepInner>);

impl Dep {
    pub(crate) fn new(cleanup: Option<Cleanup>, computed: Option<WeakMemo>) -> Self {
        Self(Rc::new(DepInner {
            id: DepId(DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            subscribers: RefCell::new(IndexMap::new()),
            cleanup,
            computed,
        }))
    }

    pub(crate) fn id(&self) -> DepId {
        self.0.id
    }

    pub(crate) fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn computed(&self) -> Option<Memo> {
        self.0.computed.as_ref().and_then(WeakMemo::upgrade)
    }

    pub(crate) fn add(&self, effect: &Effect) {
        self.0
            .subscribers
            .borrow_mut()
            .insert(effect.id(), effect.downgrade());
    }

    /// Drop a subscriber; an emptied dep detaches itself from its owner.
    pub(crate) fn remove(&self, id: SubscriberId) {
        let emptied = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            subscribers.shift_remove(&id).is_some() && subscribers.is_empty()
        };
        if emptied {
            if let Some(cleanup) = &self.0.cleanup {
                cleanup(self);
            }
        }
    }

    /// Live subscribers, in subscription order.
    fn subscribers(&self) -> SmallVec<[Effect; 8]> {
        self.0
            .subscribers
            .borrow()
            .values()
            .filter_map(WeakEffect::upgrade)
            .collect()
    }

    /// Raise every subscriber to at least `level` and schedule the ones that
    /// were clean. Runs under a scheduling pause, so scheduled work flushes
    /// after the whole set has been marked.
    pub(crate) fn notify(&self, level: DirtyLevel, event: Option<&DebugEvent>) {
        let _pause = SchedulingPause::new();
        for effect in self.subscribers() {
            // A dep the effect has not re-read during its current run is stale.
            if effect.tracks(self.id()) {
                effect.notify(level, event);
            }
        }
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscribers", &self.len())
            .finish()
    }
}

/// The lazily created dep of a single-value cell.
///
/// The dep is created on first tracked read and removes itself from the slot
/// when its last subscriber leaves.
pub(crate) struct DepSlot {
    slot: Rc<RefCell<Option<Dep>>>,
    computed: Option<WeakMemo>,
}

impl DepSlot {
    pub(crate) fn new(computed: Option<WeakMemo>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
            computed,
        }
    }

    pub(crate) fn track(&self, event: impl FnOnce() -> DebugEvent) {
        if !ReactiveContext::should_track() {
            return;
        }
        let Some(effect) = ReactiveContext::active_effect() else {
            return;
        };
        let dep = self
            .slot
            .borrow_mut()
            .get_or_insert_with(|| self.create())
            .clone();
        effect.track_dep(&dep, event);
    }

    fn create(&self) -> Dep {
        let slot: Weak<RefCell<Option<Dep>>> = Rc::downgrade(&self.slot);
        let cleanup = move |dep: &Dep| {
            if let Some(slot) = slot.upgrade() {
                let removed = {
                    let mut slot = slot.borrow_mut();
                    if slot.as_ref().is_some_and(|d| d.ptr_eq(dep) && d.is_empty()) {
                        slot.take()
                    } else {
                        None
                    }
                };
                drop(removed);
            }
        };
        Dep::new(Some(Box::new(cleanup)), self.computed.clone())
    }

    pub(crate) fn notify(&self, level: DirtyLevel, event: Option<&DebugEvent>) {
        let dep = self.slot.borrow().clone();
        if let Some(dep) = dep {
            dep.notify(level, event);
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.slot.borrow().as_ref().map_or(0, Dep::len)
    }
}
