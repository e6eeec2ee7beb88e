//! Dependency Graph
//!
//! This module holds the bipartite graph between observed locations and the
//! computations that read them.
//!
//! # Overview
//!
//! - A `Dep` is the subscriber set of one observed location: one
//!   (target, key) pair, or the single value of a reactive cell.
//! - The registry maps each observed target to its per-key Deps. It is keyed
//!   by [`crate::value::TargetId`], so it never keeps a target alive; entries
//!   of dropped targets are swept.
//! - The [`scheduler`] batches notifications: while scheduling is paused,
//!   computations that become dirty are queued and run once when the
//!   outermost pause ends.
//!
//! # Design Decisions
//!
//! 1. Edges are stored on both sides. A Dep knows its subscribers and every
//!    computation knows its Deps, so a computation whose read-set shrinks can
//!    drop exactly the subscriptions it no longer needs.
//!
//! 2. Deps hold computations weakly. A computation lives as long as its
//!    handles (or its scope) do, and dropping it unsubscribes it.
//!
//! 3. A Dep removes itself from its owner (registry entry or cell) as soon as
//!    its last subscriber leaves.

pub(crate) mod dep;
pub(crate) mod registry;
pub mod scheduler;

pub use dep::DepId;
pub use scheduler::{batch, pause_scheduling, reset_scheduling, SchedulingPause, UpdateScheduler};
