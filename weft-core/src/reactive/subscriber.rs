//! Subscriber identity and freshness.
//!
//! Every computation (effect or memo) gets a unique [`SubscriberId`] and
//! carries a [`DirtyLevel`] describing how stale its last result is.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Deps key their subscriber sets by this ID, so a computation is never
/// subscribed twice to the same location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// How stale a computation's last result is.
///
/// Levels only rise between runs; a run resets to [`DirtyLevel::Clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DirtyLevel {
    /// The last result is current.
    #[default]
    Clean,

    /// A memo this computation reads might have changed. The memo must be
    /// refreshed before deciding whether to re-run.
    Pending,

    /// A direct dependency changed; the computation must re-run.
    Dirty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn dirty_levels_are_ordered() {
        assert!(DirtyLevel::Clean < DirtyLevel::Pending);
        assert!(DirtyLevel::Pending < DirtyLevel::Dirty);
        assert_eq!(DirtyLevel::default(), DirtyLevel::Clean);
    }
}
