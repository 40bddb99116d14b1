//! Change event types flowing out of the watch layer.

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::RootId;

/// A debounced change notification for one watched file.
///
/// Produced by the backend; the keeper routes it to the roots that have
/// the file registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The file that changed.
    pub path: Utf8PathBuf,
}

impl FileEvent {
    /// Creates a file event for the given path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A coalesced "this root needs a reload" notification.
///
/// At most one of these is in flight per root: once emitted, further file
/// changes for the same root are absorbed until the consumer acknowledges
/// with [`crate::WatchKeeper::mark_consumed`]. `path` is the file whose
/// change raised the event, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootChangeEvent {
    /// The root that owns the changed file.
    pub root: RootId,
    /// The first changed file that raised the event.
    pub path: Utf8PathBuf,
}

impl RootChangeEvent {
    /// Creates a change event for the given root.
    #[must_use]
    pub fn new(root: RootId, path: &Utf8Path) -> Self {
        Self {
            root,
            path: path.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_event_new() {
        let event = FileEvent::new("/p/CMakeLists.txt");
        assert_eq!(event.path.as_str(), "/p/CMakeLists.txt");
    }

    #[test]
    fn test_root_change_event_new() {
        let event = RootChangeEvent::new(RootId::new(3), Utf8Path::new("/p/lib/CMakeLists.txt"));
        assert_eq!(event.root, RootId::new(3));
        assert_eq!(event.root.to_string(), "root#3");
    }
}
