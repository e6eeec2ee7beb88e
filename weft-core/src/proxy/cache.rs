//! View identity caches.
//!
//! One weak entry per (target, variant, inner variant). A hit while the view
//! is alive returns the same view; a view evicts its own entry when dropped,
//! and a dropped target evicts every entry for it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use super::view::{Reactive, ViewInner};
use super::Variant;
use crate::value::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    target: TargetId,
    variant: Variant,
    /// Variant of the view a readonly layer wraps.
    layered: Option<Variant>,
}

impl CacheKey {
    pub(crate) fn new(target: TargetId, variant: Variant, layered: Option<Variant>) -> Self {
        Self {
            target,
            variant,
            layered,
        }
    }
}

thread_local! {
    static VIEWS: RefCell<HashMap<CacheKey, Weak<ViewInner>>> = RefCell::new(HashMap::new());
}

pub(crate) fn lookup(key: &CacheKey) -> Option<Reactive> {
    VIEWS.with(|views| {
        views
            .borrow()
            .get(key)
            .and_then(Weak::upgrade)
            .map(Reactive::from_inner)
    })
}

pub(crate) fn insert(key: CacheKey, view: &Reactive) {
    VIEWS.with(|views| views.borrow_mut().insert(key, view.downgrade()));
}

/// Remove `key` if its view is gone.
pub(crate) fn evict(key: &CacheKey) {
    let _ = VIEWS.try_with(|views| {
        if let Ok(mut views) = views.try_borrow_mut() {
            if views.get(key).is_some_and(|view| view.strong_count() == 0) {
                views.remove(key);
            }
        }
    });
}

/// Remove every entry of a dropped target.
pub(crate) fn forget(target: TargetId) {
    let _ = VIEWS.try_with(|views| {
        if let Ok(mut views) = views.try_borrow_mut() {
            views.retain(|key, _| key.target != target);
        }
    });
}

/// Number of cached entries whose view is still alive.
pub fn live_views() -> usize {
    VIEWS.with(|views| {
        views
            .borrow()
            .values()
            .filter(|view| view.strong_count() > 0)
            .count()
    })
}

pub(crate) fn reset() {
    let drained = VIEWS.with(|views| std::mem::take(&mut *views.borrow_mut()));
    drop(drained);
}
