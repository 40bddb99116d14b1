//! Error types for the cw-pipeline crate.

use camino::Utf8PathBuf;

/// Errors that can occur while executing build steps.
///
/// A step that runs and exits non-zero is not an error at this level; the
/// exit status is reported through the pipeline report so the list policy
/// (stop or continue) can be applied. These errors cover the cases where
/// a step could not run at all.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The step's program could not be spawned.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The step's working directory does not exist.
    #[error("working directory does not exist: {0}")]
    MissingWorkingDir(Utf8PathBuf),

    /// Reading the child's output streams failed.
    #[error("failed to read process output: {0}")]
    Output(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a new [`PipelineError::Spawn`] error.
    #[inline]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}
