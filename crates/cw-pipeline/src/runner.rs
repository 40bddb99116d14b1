//! Command runners: the seam between the pipeline and real processes.
//!
//! [`CommandRunner`] turns one [`BuildStep`] into an exit code, streaming
//! the process output through an [`OutputSink`] as it arrives.
//! [`ProcessRunner`] is the production implementation on top of
//! `tokio::process`; [`ScriptedRunner`] replays canned exit codes for
//! deterministic tests.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::PipelineError;
use crate::output::{OutputFormat, OutputSink};
use crate::step::BuildStep;

/// Runs one build step to completion.
pub trait CommandRunner: Send + Sync {
    /// Executes `step`, streaming its output into `sink`, and resolves to
    /// the process exit code.
    ///
    /// A non-zero exit code is a *successful run of a failing command*;
    /// the error type is reserved for steps that could not run at all.
    fn run<'a>(
        &'a self,
        step: &'a BuildStep,
        sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<i32, PipelineError>>;
}

/// Production runner spawning real processes.
///
/// Stdout and stderr are consumed line by line concurrently with the
/// process, so sinks observe output live rather than after exit. A
/// process killed by a signal reports exit code `-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        step: &'a BuildStep,
        sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<i32, PipelineError>> {
        Box::pin(async move {
            if !step.working_dir.is_dir() {
                return Err(PipelineError::MissingWorkingDir(step.working_dir.clone()));
            }

            debug!(command = %step.command_line(), dir = %step.working_dir, "Spawning step");
            let mut child = Command::new(&step.program)
                .args(&step.args)
                .current_dir(&step.working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| PipelineError::spawn(&step.program, e))?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let drain_stdout = async {
                if let Some(out) = stdout {
                    let mut lines = BufReader::new(out).lines();
                    while let Some(line) = lines.next_line().await? {
                        sink.write_line(&line, OutputFormat::Stdout);
                    }
                }
                Ok::<(), PipelineError>(())
            };
            let drain_stderr = async {
                if let Some(err) = stderr {
                    let mut lines = BufReader::new(err).lines();
                    while let Some(line) = lines.next_line().await? {
                        sink.write_line(&line, OutputFormat::Stderr);
                    }
                }
                Ok::<(), PipelineError>(())
            };

            let (out_res, err_res, status) = tokio::join!(drain_stdout, drain_stderr, child.wait());
            out_res?;
            err_res?;
            let status = status.map_err(PipelineError::Output)?;
            Ok(status.code().unwrap_or(-1))
        })
    }
}

/// Test runner that replays scripted exit codes.
///
/// Exit codes are consumed in submission order; once the script is
/// exhausted every run succeeds. Clones share state so tests can keep a
/// handle for inspection after handing the runner to a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    inner: Arc<Mutex<Scripted>>,
}

#[derive(Debug, Default)]
struct Scripted {
    exit_codes: VecDeque<i32>,
    runs: Vec<String>,
}

impl ScriptedRunner {
    /// Creates a runner whose every step succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the exit code for the next unscripted run.
    pub fn push_exit_code(&self, code: i32) {
        self.inner.lock().exit_codes.push_back(code);
    }

    /// Returns the command lines run so far, in order.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.inner.lock().runs.clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        step: &'a BuildStep,
        _sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<i32, PipelineError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.runs.push(step.command_line());
            Ok(inner.exit_codes.pop_front().unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use camino::{Utf8Path, Utf8PathBuf};

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_process_runner_streams_both_channels() {
        let (_guard, dir) = temp_dir();
        let step = BuildStep::new("sh", ["-c", "echo out; echo err >&2; exit 3"], &dir);
        let sink = BufferSink::new();

        let code = ProcessRunner.run(&step, &sink).await.unwrap();
        assert_eq!(code, 3);
        assert_eq!(sink.lines_with(OutputFormat::Stdout), ["out"]);
        assert_eq!(sink.lines_with(OutputFormat::Stderr), ["err"]);
    }

    #[tokio::test]
    async fn test_process_runner_spawn_failure() {
        let (_guard, dir) = temp_dir();
        let step = BuildStep::new("definitely-not-a-real-program-a1b2", Vec::<String>::new(), &dir);
        let sink = BufferSink::new();

        let err = ProcessRunner.run(&step, &sink).await.unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_process_runner_missing_working_dir() {
        let step = BuildStep::new(
            "sh",
            ["-c", "true"],
            Utf8Path::new("/nonexistent/build/dir"),
        );
        let sink = BufferSink::new();

        let err = ProcessRunner.run(&step, &sink).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingWorkingDir(_)));
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_codes() {
        let runner = ScriptedRunner::new();
        runner.push_exit_code(2);
        let sink = BufferSink::new();
        let step = BuildStep::new("make", ["all"], Utf8Path::new("/p/build"));

        assert_eq!(runner.run(&step, &sink).await.unwrap(), 2);
        assert_eq!(runner.run(&step, &sink).await.unwrap(), 0);
        assert_eq!(runner.command_lines(), ["make all", "make all"]);
    }
}
