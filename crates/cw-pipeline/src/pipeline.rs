//! Sequential build list execution.
//!
//! [`BuildPipeline`] runs the steps of a [`BuildList`] in order, applying
//! the list's failure policy, and produces a [`PipelineReport`] carrying
//! the list's [`RequestToken`]. Callers correlate completions by that
//! token only.

use tracing::{info, warn};

use crate::output::{OutputFormat, OutputSink};
use crate::runner::CommandRunner;
use crate::step::{BuildKind, BuildList, ListState, RequestToken};

/// One step that did not exit zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Zero-based index of the step in its list.
    pub index: usize,
    /// The command line that failed, for diagnostics.
    pub command_line: String,
    /// Exit code, or `None` when the step could not run at all.
    pub exit_code: Option<i32>,
}

/// Outcome of executing one build list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Token of the list this report answers.
    pub token: RequestToken,
    /// The list's kind.
    pub kind: BuildKind,
    /// Terminal state: [`ListState::Succeeded`] or [`ListState::Failed`].
    pub state: ListState,
    /// Number of steps that were attempted.
    pub steps_run: usize,
    /// Failures in step order. Empty iff the list succeeded.
    pub failures: Vec<StepFailure>,
}

impl PipelineReport {
    /// Returns `true` if every step exited zero.
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == ListState::Succeeded
    }
}

/// Executes build lists one step at a time.
///
/// The pipeline is stateless between lists; concurrency policy (how many
/// lists run at once, and for which roots) lives in the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct BuildPipeline<R> {
    runner: R,
}

impl<R: CommandRunner> BuildPipeline<R> {
    /// Creates a pipeline over the given runner.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Runs `list` to completion and reports the outcome.
    ///
    /// Steps run strictly in order. A failing step stops the remainder
    /// unless the list sets `continue_on_failure`; either way the final
    /// state is [`ListState::Failed`] as soon as any step fails.
    pub async fn execute(&self, list: &BuildList, sink: &dyn OutputSink) -> PipelineReport {
        let total = list.steps.len();
        info!(token = %list.token, kind = list.kind.label(), steps = total, "Build list started");

        let mut steps_run = 0;
        let mut failures = Vec::new();

        for (index, step) in list.steps.iter().enumerate() {
            sink.write_line(
                &format!("[{}/{}] {}", index + 1, total, step.command_line()),
                OutputFormat::Diagnostic,
            );
            steps_run += 1;

            match self.runner.run(step, sink).await {
                Ok(0) => {}
                Ok(code) => {
                    sink.write_line(
                        &format!("step exited with code {code}: {}", step.command_line()),
                        OutputFormat::Diagnostic,
                    );
                    failures.push(StepFailure {
                        index,
                        command_line: step.command_line(),
                        exit_code: Some(code),
                    });
                    if !list.continue_on_failure {
                        break;
                    }
                }
                Err(error) => {
                    sink.write_line(
                        &format!("step could not run: {error}"),
                        OutputFormat::Diagnostic,
                    );
                    failures.push(StepFailure {
                        index,
                        command_line: step.command_line(),
                        exit_code: None,
                    });
                    if !list.continue_on_failure {
                        break;
                    }
                }
            }
        }

        let state = if failures.is_empty() {
            ListState::Succeeded
        } else {
            ListState::Failed
        };
        if state == ListState::Failed {
            warn!(token = %list.token, kind = list.kind.label(), steps_run, "Build list failed");
        } else {
            info!(token = %list.token, kind = list.kind.label(), steps_run, "Build list succeeded");
        }

        PipelineReport {
            token: list.token,
            kind: list.kind,
            state,
            steps_run,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use crate::runner::ScriptedRunner;
    use crate::step::BuildStep;
    use camino::Utf8Path;

    fn steps(n: usize) -> Vec<BuildStep> {
        (0..n)
            .map(|i| BuildStep::new("make", [format!("step{i}")], Utf8Path::new("/p/build")))
            .collect()
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_steps() {
        let runner = ScriptedRunner::new();
        runner.push_exit_code(0);
        runner.push_exit_code(2);
        let pipeline = BuildPipeline::new(runner.clone());
        let list = BuildList::new(BuildKind::Build, steps(3));
        let sink = BufferSink::new();

        let report = pipeline.execute(&list, &sink).await;

        assert_eq!(report.state, ListState::Failed);
        assert_eq!(report.steps_run, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].exit_code, Some(2));
        assert_eq!(runner.command_lines().len(), 2, "third step must not run");
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_everything() {
        let runner = ScriptedRunner::new();
        runner.push_exit_code(1);
        let pipeline = BuildPipeline::new(runner.clone());
        let list = BuildList::new(BuildKind::Build, steps(3)).with_continue_on_failure(true);
        let sink = BufferSink::new();

        let report = pipeline.execute(&list, &sink).await;

        assert_eq!(report.state, ListState::Failed);
        assert_eq!(report.steps_run, 3);
        assert_eq!(runner.command_lines().len(), 3);
    }

    #[tokio::test]
    async fn test_report_echoes_token() {
        let pipeline = BuildPipeline::new(ScriptedRunner::new());
        let list = BuildList::new(BuildKind::Configure, steps(1));
        let token = list.token;
        let sink = BufferSink::new();

        let report = pipeline.execute(&list, &sink).await;

        assert_eq!(report.token, token);
        assert_eq!(report.kind, BuildKind::Configure);
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_empty_list_succeeds() {
        let pipeline = BuildPipeline::new(ScriptedRunner::new());
        let list = BuildList::new(BuildKind::Clean, Vec::new());
        let sink = BufferSink::new();

        let report = pipeline.execute(&list, &sink).await;

        assert!(report.succeeded());
        assert_eq!(report.steps_run, 0);
    }

    #[tokio::test]
    async fn test_diagnostics_narrate_steps() {
        let runner = ScriptedRunner::new();
        runner.push_exit_code(7);
        let pipeline = BuildPipeline::new(runner);
        let list = BuildList::new(BuildKind::Build, steps(1));
        let sink = BufferSink::new();

        pipeline.execute(&list, &sink).await;

        let diags = sink.lines_with(crate::output::OutputFormat::Diagnostic);
        assert!(diags[0].starts_with("[1/1]"));
        assert!(diags[1].contains("exited with code 7"));
    }
}
