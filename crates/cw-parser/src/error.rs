//! Error types for the cw-parser crate.
//!
//! This module provides the [`ParseError`] type for failures while reading
//! and parsing project descriptors.
//!
//! A parse failure is always distinct from a successful parse that found
//! no targets: the latter returns an outcome with an empty target list,
//! the former returns one of these errors and nothing gets installed or
//! registered with the watcher.

use camino::Utf8PathBuf;

/// Errors that can occur while parsing a project descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to read a descriptor file.
    #[error("failed to read descriptor {path}: {source}")]
    Read {
        /// The descriptor that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The descriptor contains malformed syntax.
    #[error("syntax error in {path} at line {line}: {message}")]
    Syntax {
        /// The descriptor containing the error.
        path: Utf8PathBuf,
        /// 1-based line of the offending token.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The descriptor contains no commands at all.
    ///
    /// An empty file is treated as malformed rather than as a project
    /// without targets.
    #[error("descriptor is empty: {0}")]
    EmptyDescriptor(Utf8PathBuf),

    /// `add_subdirectory` nesting exceeded the configured limit.
    #[error("subdirectory depth limit ({limit}) exceeded at {path}")]
    DepthExceeded {
        /// The descriptor that crossed the limit.
        path: Utf8PathBuf,
        /// The configured limit.
        limit: usize,
    },

    /// A descriptor path is not valid UTF-8.
    #[error("descriptor path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// Building the item tree violated a tree invariant.
    #[error("tree construction failed: {0}")]
    Tree(#[from] cw_core::TreeError),
}

impl ParseError {
    /// Creates a new [`ParseError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ParseError::Syntax`] error.
    #[inline]
    pub fn syntax(path: impl Into<Utf8PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Returns the descriptor path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Read { path, .. }
            | Self::Syntax { path, .. }
            | Self::EmptyDescriptor(path)
            | Self::DepthExceeded { path, .. } => Some(path),
            Self::NonUtf8Path(_) | Self::Tree(_) => None,
        }
    }
}
