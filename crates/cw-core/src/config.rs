//! Configuration structures for cmake-workbench.
//!
//! - [`ParserConfig`] - parser limits (subdirectory depth, parallelism)
//! - [`WatchConfig`] - file watcher settings (debouncing)
//! - [`PipelineConfig`] - build pipeline settings (continue-on-failure)
//! - [`Config`] - root configuration combining all settings
//!
//! All configuration types implement [`Default`] with values that match
//! the behavior of the original project subsystem.

use serde::{Deserialize, Serialize};

/// Configuration for the descriptor parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum `add_subdirectory` nesting depth.
    ///
    /// Guards against descriptor cycles that the visited-set misses
    /// (e.g. symlinked directories).
    pub max_subdir_depth: usize,

    /// Maximum number of parallel subdirectory parse jobs.
    /// `None` means use all available CPU cores.
    pub max_parallel_jobs: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_subdir_depth: 32,
            max_parallel_jobs: None,
        }
    }
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use cw_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.debounce_ms, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window in milliseconds.
    ///
    /// Multiple filesystem notifications within this window collapse
    /// into a single event.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Configuration for the build step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Continue running remaining steps after a step fails.
    ///
    /// The default (false) halts the list on the first non-zero exit.
    pub continue_on_failure: bool,

    /// Per-root worker pool size for parse jobs.
    pub workers_per_root: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            continue_on_failure: false,
            workers_per_root: 2,
        }
    }
}

/// Root configuration for cmake-workbench.
///
/// # Examples
///
/// ```
/// use cw_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parser configuration.
    pub parser: ParserConfig,

    /// File watcher configuration.
    pub watch: WatchConfig,

    /// Build pipeline configuration.
    pub pipeline: PipelineConfig,
}
