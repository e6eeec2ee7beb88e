//! Effect scopes.
//!
//! A scope owns the effects and memos created while it runs, so a whole
//! group of computations can be disposed together. Scopes nest: a scope
//! created inside another running scope is stopped with it, unless it was
//! created detached.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::Effect;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    active: Cell<bool>,
    effects: RefCell<Vec<Effect>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<EffectScope>>,
}

/// Owner of a group of computations.
#[derive(Clone)]
pub struct EffectScope(Rc<ScopeInner>);

impl EffectScope {
    /// Create a scope. If another scope is running, the new one becomes its
    /// child.
    pub fn new() -> Self {
        let scope = Self::detached();
        if let Some(parent) = current_scope() {
            if parent.is_active() {
                parent.0.children.borrow_mut().push(scope.clone());
            }
        }
        scope
    }

    /// Create a scope that is not collected by the running scope.
    pub fn detached() -> Self {
        Self(Rc::new(ScopeInner {
            active: Cell::new(true),
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    /// Run `f` with this scope collecting new computations.
    ///
    /// Returns `None` without running `f` if the scope was stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            tracing::warn!("cannot run an inactive effect scope");
            return None;
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = ScopeGuard;
        Some(f())
    }

    /// Dispose every owned effect, run the dispose callbacks, and stop the
    /// child scopes. Idempotent.
    pub fn stop(&self) {
        if !self.0.active.replace(false) {
            return;
        }
        let effects = std::mem::take(&mut *self.0.effects.borrow_mut());
        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        tracing::debug!(
            effects = effects.len(),
            children = children.len(),
            "effect scope stopped"
        );
        for effect in &effects {
            effect.dispose();
        }
        for cleanup in cleanups {
            cleanup();
        }
        for child in &children {
            child.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Register `f` to run when this scope stops.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        if self.is_active() {
            self.0.cleanups.borrow_mut().push(Box::new(f));
        }
    }

    /// Number of computations owned by this scope.
    pub fn effect_count(&self) -> usize {
        self.0.effects.borrow().len()
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("effects", &self.effect_count())
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = SCOPE_STACK.with(|stack| stack.borrow_mut().pop());
        drop(popped);
    }
}

/// The scope currently collecting computations, if any.
pub fn current_scope() -> Option<EffectScope> {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Register `f` to run when the current scope stops. Returns false when no
/// scope is running.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) -> bool {
    match current_scope() {
        Some(scope) => {
            scope.on_dispose(f);
            true
        }
        None => false,
    }
}

/// Hand a new computation to the running scope.
pub(crate) fn record(effect: &Effect) {
    if let Some(scope) = current_scope() {
        if scope.is_active() {
            scope.0.effects.borrow_mut().push(effect.clone());
        }
    }
}

pub(crate) fn reset() {
    let drained = SCOPE_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
    drop(drained);
}
