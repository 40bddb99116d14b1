//! Error types for the cw-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related
//! errors that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use cw_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingDescriptor(Utf8PathBuf::from("/proj/CMakeLists.txt"));
/// assert!(error.to_string().contains("/proj/CMakeLists.txt"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// The project descriptor file does not exist.
    #[error("missing project descriptor: {0}")]
    MissingDescriptor(Utf8PathBuf),

    /// A path is not valid UTF-8.
    ///
    /// UTF-8 paths are used throughout the workspace; non-UTF-8 paths are
    /// rejected at the boundary.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
