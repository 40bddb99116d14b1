//! Build step execution for the CMake workbench.
//!
//! This crate turns build lists into running processes:
//!
//! - [`BuildStep`] / [`BuildList`] describe what to run; every list gets
//!   a unique [`RequestToken`] at creation.
//! - [`BuildPipeline`] executes a list sequentially, honoring its failure
//!   policy, and answers with a [`PipelineReport`] echoing the token.
//! - [`CommandRunner`] is the process seam: [`ProcessRunner`] spawns real
//!   commands via `tokio::process` with line-streamed output,
//!   [`ScriptedRunner`] replays canned exit codes in tests.
//! - [`OutputSink`] receives every output line tagged with an
//!   [`OutputFormat`]; [`TracingSink`] forwards to the subscriber,
//!   [`BufferSink`] records in memory.
//!
//! Completion is correlated by token, never by comparing command-line
//! text, so identical commands submitted twice stay distinguishable.
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use cw_core::ProjectInfo;
//! use cw_pipeline::{BuildKind, BuildList, BuildPipeline, BuildStep, ProcessRunner, TracingSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"))
//!         .with_build_args(["-S", ".", "-B", "build"]);
//!     let list = BuildList::new(BuildKind::Configure, vec![BuildStep::configure(&info)]);
//!
//!     let pipeline = BuildPipeline::new(ProcessRunner);
//!     let report = pipeline.execute(&list, &TracingSink).await;
//!     println!("{}: {:?}", report.token, report.state);
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod step;

pub use error::PipelineError;
pub use output::{BufferSink, OutputFormat, OutputSink, TracingSink};
pub use pipeline::{BuildPipeline, PipelineReport, StepFailure};
pub use runner::{CommandRunner, ProcessRunner, ScriptedRunner};
pub use step::{BuildKind, BuildList, BuildStep, ListState, RequestToken};
