//! Reactive Primitives
//!
//! This module implements the computation side of the engine: effects,
//! memos, signals and the runtime that connects them to observed targets.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that runs whenever its dependencies change.
//! Every read it makes while running (of a view, a signal or a memo) is
//! recorded; the recorded set is replaced on every run.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when read after one of its dependencies changed, and only makes its own
//! readers re-run when the result actually differs.
//!
//! ## Signals
//!
//! A Signal is a single mutable reactive value, the cell counterpart of a
//! wrapped container.
//!
//! ## Scopes
//!
//! An [`EffectScope`] owns the computations created while it runs and
//! disposes them together.
//!
//! # Implementation Notes
//!
//! The system uses a thread-local tracking context to detect dependencies
//! automatically. When a value is read, we check if there is an active
//! computation and, if so, record the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod memo;
mod runtime;
pub(crate) mod scope;
mod signal;
mod subscriber;

pub use context::{
    is_tracking_paused, pause_tracking, reset_tracking, untracked, ReactiveContext, TrackingPause,
};
pub use effect::{run_tracked, DebugHook, Effect, EffectOptions, SchedulerFn};
pub use memo::Memo;
pub use runtime::{DebugEvent, DebugOp, Runtime, TrackOp, Trigger, TriggerOp};
pub use scope::{current_scope, on_scope_dispose, EffectScope};
pub use signal::{is_ref, unref, ReactiveCell, Signal};
pub use subscriber::{DirtyLevel, SubscriberId};

pub(crate) use effect::WeakEffect;
pub(crate) use memo::WeakMemo;
