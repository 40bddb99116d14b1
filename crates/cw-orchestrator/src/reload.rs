//! The reload set: which roots have a reconfigure pending.
//!
//! A root enters the set when a descriptor change is accepted and leaves
//! it exactly once, on completion of the matching configure pipeline -
//! success and failure paths both clear it, so no root can stay pending
//! forever. Membership doubles as the coalescing guard: changes arriving
//! while a root is in the set are absorbed into the pending reconfigure.

use cw_core::{FxHashSet, RootId};
use parking_lot::Mutex;

/// Thread-safe set of roots awaiting reconfiguration.
#[derive(Debug, Default)]
pub struct ReloadSet {
    inner: Mutex<FxHashSet<RootId>>,
}

impl ReloadSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a root as pending. Returns `false` if it already was,
    /// in which case the caller must not start another reconfigure.
    pub fn insert(&self, root: RootId) -> bool {
        self.inner.lock().insert(root)
    }

    /// Returns `true` if a reconfigure is pending for `root`.
    #[must_use]
    pub fn contains(&self, root: RootId) -> bool {
        self.inner.lock().contains(&root)
    }

    /// Clears the pending mark. Returns `true` if it was set.
    pub fn remove(&self, root: RootId) -> bool {
        self.inner.lock().remove(&root)
    }

    /// Number of roots currently pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` when no reconfigure is pending anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
