//! The presentation seam.
//!
//! The orchestrator does not render anything; it pushes installed trees
//! through a [`ProjectView`] when one is attached. A missing view is a
//! logged no-op for every operation, never an error - the core keeps
//! working headless (the CLI runs this way).

use std::sync::Arc;

use cw_core::{ItemTree, RootId};
use parking_lot::Mutex;

/// Receives project model updates for display.
pub trait ProjectView: Send + Sync {
    /// Installs a freshly parsed tree as a new top-level item.
    fn add_root_item(&self, root: RootId, tree: &Arc<ItemTree>);

    /// Removes a root's item and everything under it.
    fn remove_root_item(&self, root: RootId);

    /// Expands a root's subtree down to `depth` levels.
    fn expand_to_depth(&self, root: RootId, depth: usize);

    /// Brings the project view to the front.
    fn switch_to_view(&self);
}

/// View that records every call, for tests.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    added: Vec<(RootId, usize)>,
    removed: Vec<RootId>,
    expanded: Vec<(RootId, usize)>,
    switches: usize,
}

impl RecordingView {
    /// Creates an empty recording view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots installed so far, with the node count of each tree.
    #[must_use]
    pub fn added(&self) -> Vec<(RootId, usize)> {
        self.inner.lock().added.clone()
    }

    /// Roots removed so far, in order.
    #[must_use]
    pub fn removed(&self) -> Vec<RootId> {
        self.inner.lock().removed.clone()
    }

    /// Expansion requests seen so far.
    #[must_use]
    pub fn expanded(&self) -> Vec<(RootId, usize)> {
        self.inner.lock().expanded.clone()
    }

    /// Number of times the view was raised.
    #[must_use]
    pub fn switches(&self) -> usize {
        self.inner.lock().switches
    }
}

impl ProjectView for RecordingView {
    fn add_root_item(&self, root: RootId, tree: &Arc<ItemTree>) {
        self.inner.lock().added.push((root, tree.len()));
    }

    fn remove_root_item(&self, root: RootId) {
        self.inner.lock().removed.push(root);
    }

    fn expand_to_depth(&self, root: RootId, depth: usize) {
        self.inner.lock().expanded.push((root, depth));
    }

    fn switch_to_view(&self) {
        self.inner.lock().switches += 1;
    }
}
