//! Dependency Registry
//!
//! Maps every observed target to the Deps of its observed keys.
//!
//! # Lifetime
//!
//! Entries are keyed by [`TargetId`] and never hold the target itself. When
//! the last handle to a target drops, [`forget`] removes its entry. If the
//! registry is borrowed at that moment (a target can drop while the registry
//! is dropping something else), the id is parked in a graveyard and swept on
//! the next track or trigger.
//!
//! Anything removed from the registry is moved out of the borrow before it is
//! dropped, since dropping a key can drop a target and re-enter [`forget`].

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::dep::Dep;
use crate::value::{Key, Target, TargetId};

type KeyDeps = IndexMap<Key, Dep>;

thread_local! {
    static REGISTRY: RefCell<HashMap<TargetId, KeyDeps>> = RefCell::new(HashMap::new());
    static GRAVEYARD: RefCell<Vec<TargetId>> = const { RefCell::new(Vec::new()) };
}

/// The Dep for (`target`, `key`), created on first use.
pub(crate) fn dep_for(target: TargetId, key: &Key) -> Dep {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let deps = registry.entry(target).or_default();
        if let Some(dep) = deps.get(key) {
            return dep.clone();
        }
        let owner_key = key.clone();
        let dep = Dep::new(
            Some(Box::new(move |dep: &Dep| remove_dep(target, &owner_key, dep))),
            None,
        );
        deps.insert(key.clone(), dep.clone());
        dep
    })
}

/// Collect Deps of `target` with `select`. Returns an empty set when the
/// target was never observed.
pub(crate) fn select<F>(target: TargetId, select: F) -> SmallVec<[Dep; 4]>
where
    F: FnOnce(&KeyDeps) -> SmallVec<[Dep; 4]>,
{
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .get(&target)
            .map(select)
            .unwrap_or_default()
    })
}

/// Remove `dep` from the registry if it is still the Dep registered for
/// (`target`, `key`) and has no subscribers left.
fn remove_dep(target: TargetId, key: &Key, dep: &Dep) {
    let removed = REGISTRY.try_with(|registry| {
        let mut registry = registry.try_borrow_mut().ok()?;
        let deps = registry.get_mut(&target)?;
        if !deps.get(key).is_some_and(|d| d.ptr_eq(dep) && d.is_empty()) {
            return None;
        }
        let entry = deps.swap_remove_entry(key);
        let emptied = if deps.is_empty() {
            registry.remove(&target)
        } else {
            None
        };
        Some((entry, emptied))
    });
    drop(removed);
}

/// Drop every entry of a target that no longer exists.
pub(crate) fn forget(target: TargetId) {
    let removed = REGISTRY.try_with(|registry| match registry.try_borrow_mut() {
        Ok(mut registry) => Ok(registry.remove(&target)),
        Err(_) => Err(()),
    });
    match removed {
        Ok(Ok(entry)) => drop(entry),
        Ok(Err(())) => {
            let _ = GRAVEYARD.try_with(|graveyard| graveyard.borrow_mut().push(target));
        }
        // Thread teardown: the registry is already gone.
        Err(_) => {}
    }
}

/// Remove entries parked by [`forget`] while the registry was busy.
pub(crate) fn sweep() {
    let parked = GRAVEYARD.with(|graveyard| std::mem::take(&mut *graveyard.borrow_mut()));
    if parked.is_empty() {
        return;
    }
    tracing::trace!(targets = parked.len(), "sweeping dropped targets");
    for target in parked {
        forget(target);
    }
}

/// Number of observed keys on `target`.
pub(crate) fn key_count(target: &Target) -> usize {
    REGISTRY.with(|registry| registry.borrow().get(&target.id()).map_or(0, IndexMap::len))
}

/// Number of subscribers of (`target`, `key`).
pub(crate) fn subscriber_count(target: &Target, key: &Key) -> usize {
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .get(&target.id())
            .and_then(|deps| deps.get(key))
            .map_or(0, Dep::len)
    })
}

/// Number of targets with at least one observed key.
pub(crate) fn target_count() -> usize {
    sweep();
    REGISTRY.with(|registry| registry.borrow().len())
}

pub(crate) fn reset() {
    let drained = REGISTRY.with(|registry| std::mem::take(&mut *registry.borrow_mut()));
    drop(drained);
    GRAVEYARD.with(|graveyard| graveyard.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_for_returns_the_same_dep() {
        let target = Target::record();
        let a = dep_for(target.id(), &Key::from("x"));
        let b = dep_for(target.id(), &Key::from("x"));
        let c = dep_for(target.id(), &Key::from("y"));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(key_count(&target), 2);
    }

    #[test]
    fn forgetting_a_target_drops_its_entry() {
        let target = Target::record();
        let _dep = dep_for(target.id(), &Key::from("x"));
        assert_eq!(key_count(&target), 1);

        forget(target.id());
        assert_eq!(key_count(&target), 0);
    }

    #[test]
    fn dropped_target_is_forgotten() {
        let before = target_count();
        {
            let target = Target::array();
            let _dep = dep_for(target.id(), &Key::Length);
            assert_eq!(target_count(), before + 1);
        }
        assert_eq!(target_count(), before);
    }
}
