//! Output sinks: where streamed build output goes.
//!
//! Every line a step produces is tagged with an [`OutputFormat`] and
//! pushed through an [`OutputSink`]. The pipeline itself emits
//! [`OutputFormat::Diagnostic`] lines for step boundaries and failures, so
//! a sink sees the full narrative of a build in order.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

/// How a line of build output is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// A line from the step's standard output.
    Stdout,
    /// A line from the step's standard error.
    Stderr,
    /// A line produced by the pipeline itself (step started, failed, ...).
    Diagnostic,
}

/// Receives build output line by line.
///
/// Implementations must be cheap and non-blocking; they are called from
/// the tasks streaming a live process's output.
pub trait OutputSink: Send + Sync {
    /// Delivers one line with its classification.
    fn write_line(&self, line: &str, format: OutputFormat);
}

/// Sink that forwards output into the tracing subscriber.
///
/// Stdout and diagnostic lines log at info, stderr at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write_line(&self, line: &str, format: OutputFormat) {
        match format {
            OutputFormat::Stdout => info!(target: "build_output", "{line}"),
            OutputFormat::Stderr => warn!(target: "build_output", "{line}"),
            OutputFormat::Diagnostic => info!(target: "build_output", "[pipeline] {line}"),
        }
    }
}

/// Sink that records lines in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<(String, OutputFormat)>>>,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(String, OutputFormat)> {
        self.lines.lock().clone()
    }

    /// Returns the recorded lines matching `format`.
    #[must_use]
    pub fn lines_with(&self, format: OutputFormat) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(_, f)| *f == format)
            .map(|(l, _)| l.clone())
            .collect()
    }
}

impl OutputSink for BufferSink {
    fn write_line(&self, line: &str, format: OutputFormat) {
        self.lines.lock().push((line.to_owned(), format));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_records_in_order() {
        let sink = BufferSink::new();
        sink.write_line("configuring", OutputFormat::Diagnostic);
        sink.write_line("-- done", OutputFormat::Stdout);
        sink.write_line("warning: x", OutputFormat::Stderr);

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], ("-- done".to_owned(), OutputFormat::Stdout));
        assert_eq!(sink.lines_with(OutputFormat::Stderr), ["warning: x"]);
    }

    #[test]
    fn test_buffer_sink_clones_share_state() {
        let sink = BufferSink::new();
        let clone = sink.clone();
        clone.write_line("hello", OutputFormat::Stdout);
        assert_eq!(sink.lines().len(), 1);
    }
}
