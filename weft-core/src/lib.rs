//! Weft Core
//!
//! Fine-grained dependency tracking and invalidation for observable object
//! graphs. Computations read plain mutable data (records, arrays, maps and
//! sets) through wrapped views; every read is recorded, and every write
//! re-runs exactly the computations that read what changed.
//!
//! It implements:
//!
//! - Wrapped views with mutable, readonly and shallow variants
//! - Array and collection instrumentation with identity-aware keys
//! - Effects, memos, signals and effect scopes
//! - A pausable scheduler that flushes each affected computation once
//!
//! # Architecture
//!
//! - `value`: the value model and raw containers
//! - `proxy`: wrapped views and their identity caches
//! - `graph`: dependency records, the registry and the scheduler
//! - `reactive`: computations, cells and the tracking runtime
//! - `config` / `error`: engine tunables and developer diagnostics
//!
//! All engine state is thread-local; values are `Rc`-based and stay on the
//! thread that created them.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use weft_core::{reactive, Effect, Target, Value};
//!
//! let state = reactive(Target::record_from([("count", 0)]))
//!     .view()
//!     .expect("records are wrapped");
//!
//! let seen = Rc::new(Cell::new(0));
//! let (reader, out) = (state.clone(), seen.clone());
//! let _effect = Effect::new(move || {
//!     out.set(reader.get("count").as_int().unwrap_or(0));
//! });
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 5);
//! assert_eq!(state.get("count"), Value::from(5));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod proxy;
pub mod reactive;
pub mod value;

pub use error::ReactiveError;
pub use graph::batch;
pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, wrap, ArrayView,
    CollectionView, Reactive, Variant,
};
pub use reactive::{
    is_ref, run_tracked, unref, untracked, Effect, EffectOptions, EffectScope, Memo,
    ReactiveCell, Runtime, Signal,
};
pub use value::{Key, Target, TargetKind, Value};
