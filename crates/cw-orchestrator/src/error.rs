//! Error types for the cw-orchestrator crate.
//!
//! Most failure modes here are reported as events rather than errors: a
//! parse failure or a failed configure is a normal outcome the caller
//! observes through [`crate::ProjectEvent`] and the configure result. The
//! error type covers misuse of the root lifecycle itself.

use cw_core::RootId;
use cw_watcher::WatchError;

/// Errors from orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The referenced root does not exist (never created, or removed).
    #[error("unknown project root: {0}")]
    UnknownRoot(RootId),

    /// The watch layer failed while wiring up a root.
    #[error("watch setup failed: {0}")]
    Watch(#[from] WatchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_root_display() {
        let err = OrchestratorError::UnknownRoot(RootId::new(4));
        assert_eq!(err.to_string(), "unknown project root: root#4");
    }
}
