//! Notifications emitted by the orchestrator.
//!
//! Observers (the CLI, tests, an embedding UI) consume these over an
//! unbounded mpsc channel. Events are informational; the orchestrator
//! never waits for a consumer.

use cw_core::RootId;
use cw_pipeline::RequestToken;

/// One lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// A parse completed and the tree was installed.
    TreeReady {
        /// The root whose tree is now live.
        root: RootId,
        /// Total node count of the installed tree.
        nodes: usize,
        /// Number of discovered build targets.
        targets: usize,
    },

    /// A parse failed; nothing was installed or registered.
    ParseFailed {
        /// The root the parse was for.
        root: RootId,
        /// Rendered parse error.
        message: String,
    },

    /// A configure pipeline finished with a failure.
    ConfigureFailed {
        /// Token of the failed configure request.
        token: RequestToken,
        /// Summary of the failure (failing command and exit status).
        message: String,
    },

    /// A root was removed and its resources released.
    RootRemoved {
        /// The removed root.
        root: RootId,
    },
}

impl ProjectEvent {
    /// Returns the root this event concerns, when it has one.
    #[must_use]
    pub const fn root(&self) -> Option<RootId> {
        match self {
            Self::TreeReady { root, .. }
            | Self::ParseFailed { root, .. }
            | Self::RootRemoved { root } => Some(*root),
            Self::ConfigureFailed { .. } => None,
        }
    }
}
