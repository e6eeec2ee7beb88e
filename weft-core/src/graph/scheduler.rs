//! Update Scheduler
//!
//! The scheduler decides when dirty computations run.
//!
//! # Algorithm
//!
//! Scheduling is governed by a pause depth:
//!
//! 1. Every notification runs inside a pause, so a single write that dirties
//!    several computations marks all of them before any of them runs.
//! 2. A computation that becomes dirty is appended to the queue at most once
//!    per clean-to-dirty transition.
//! 3. When the outermost pause ends, the queue is drained in FIFO order.
//!    Each job first confirms the computation is still dirty, so work that an
//!    earlier job made unnecessary is skipped.
//!
//! [`batch`] extends the pause over arbitrary user code: writes inside it only
//! mark, and everything runs once when it returns.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::reactive::Effect;

thread_local! {
    static SCHEDULER: RefCell<UpdateScheduler> = RefCell::new(UpdateScheduler::new());
}

/// Pause depth and pending queue of the current thread.
#[derive(Default)]
pub struct UpdateScheduler {
    paused: usize,
    queue: VecDeque<Effect>,
}

impl UpdateScheduler {
    fn new() -> Self {
        Self::default()
    }

    /// Number of queued computations waiting for the pause to end.
    pub fn pending() -> usize {
        SCHEDULER.with(|s| s.borrow().queue.len())
    }

    /// Whether scheduling is currently paused.
    pub fn is_paused() -> bool {
        SCHEDULER.with(|s| s.borrow().paused > 0)
    }

    pub(crate) fn reset() {
        let drained = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.paused = 0;
            std::mem::take(&mut s.queue)
        });
        drop(drained);
    }
}

/// Queue a computation to run when scheduling resumes.
pub(crate) fn enqueue(effect: Effect) {
    SCHEDULER.with(|s| s.borrow_mut().queue.push_back(effect));
}

/// Increase the pause depth.
pub fn pause_scheduling() {
    SCHEDULER.with(|s| s.borrow_mut().paused += 1);
}

/// Decrease the pause depth, draining the queue when it reaches zero.
pub fn reset_scheduling() {
    SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        s.paused = s.paused.saturating_sub(1);
    });
    flush();
}

fn flush() {
    loop {
        // The borrow ends before the job runs; jobs notify and enqueue.
        let job = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            if s.paused > 0 {
                None
            } else {
                s.queue.pop_front()
            }
        });
        match job {
            Some(effect) => effect.run_scheduled(),
            None => break,
        }
    }
}

/// Guard that pauses scheduling until dropped.
pub struct SchedulingPause {
    _private: (),
}

impl SchedulingPause {
    pub fn new() -> Self {
        pause_scheduling();
        Self { _private: () }
    }
}

impl Default for SchedulingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SchedulingPause {
    fn drop(&mut self) {
        reset_scheduling();
    }
}

/// Run `f` with scheduling paused. Computations dirtied inside run once,
/// after `f` returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _pause = SchedulingPause::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_nest() {
        assert!(!UpdateScheduler::is_paused());
        {
            let _outer = SchedulingPause::new();
            {
                let _inner = SchedulingPause::new();
                assert!(UpdateScheduler::is_paused());
            }
            assert!(UpdateScheduler::is_paused());
        }
        assert!(!UpdateScheduler::is_paused());
    }

    #[test]
    fn unbalanced_reset_saturates() {
        reset_scheduling();
        assert!(!UpdateScheduler::is_paused());
    }

    #[test]
    fn batch_returns_closure_result() {
        assert_eq!(batch(|| 42), 42);
        assert_eq!(UpdateScheduler::pending(), 0);
    }
}
