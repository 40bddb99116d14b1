//! Error types for the cw-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while registering descriptor files and streaming change events.

use camino::Utf8PathBuf;

/// Errors that can occur during descriptor watching.
///
/// Registration errors ([`WatchError::Notify`], [`WatchError::PathNotFound`],
/// [`WatchError::Io`]) are fatal for the path being registered; the keeper
/// leaves the registry unchanged for that path. A non-UTF-8 path in a change
/// event is recoverable and is logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The descriptor file to watch does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The change event channel was closed unexpectedly.
    #[error("change event channel closed unexpectedly")]
    ChannelClosed,

    /// A path is not valid UTF-8.
    ///
    /// UTF-8 paths are used throughout the workspace. Non-UTF-8 paths in
    /// change events are logged and skipped rather than surfaced here.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred while validating a path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Returns `true` if watching can continue after this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_))
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::Notify(_) | Self::ChannelClosed | Self::NonUtf8Path(_) | Self::Io(_) => None,
        }
    }
}
