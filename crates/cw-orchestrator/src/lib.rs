//! Project orchestration for the CMake workbench.
//!
//! This crate ties the parser, watcher, and pipeline together around the
//! lifecycle of project roots:
//!
//! - [`Orchestrator`] - root creation/removal, the configure operation,
//!   and the descriptor-change reconfigure loop.
//! - [`ReloadSet`] - coalescing guard: at most one pending reconfigure
//!   per root.
//! - [`WorkerPool`] / [`ParseJob`] - bounded per-root job execution with
//!   cooperative drain on removal.
//! - [`ProjectView`] - the presentation seam; headless operation is a
//!   logged no-op.
//! - [`ProjectEvent`] - lifecycle notifications for observers.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use cw_core::{Config, ProjectInfo};
//! use cw_orchestrator::Orchestrator;
//! use cw_pipeline::{BuildPipeline, ProcessRunner, TracingSink};
//! use cw_watcher::{NotifyBackend, WatchKeeper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let (keeper, changes) = WatchKeeper::new(|router| NotifyBackend::new(&config.watch, router))?;
//!     let pipeline = BuildPipeline::new(ProcessRunner);
//!
//!     let (orchestrator, mut events) =
//!         Orchestrator::new(config, keeper, pipeline, Arc::new(TracingSink), None);
//!
//!     let driver = orchestrator.clone();
//!     tokio::spawn(async move { driver.drive_changes(changes).await });
//!
//!     let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"))
//!         .with_build_program("cmake")
//!         .with_build_args(["-S", ".", "-B", "build"]);
//!     orchestrator.configure(info).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod pool;
pub mod reload;
pub mod view;

pub use error::OrchestratorError;
pub use events::ProjectEvent;
pub use orchestrator::{ConfigureOutcome, Orchestrator};
pub use pool::{ParseJob, WorkerPool};
pub use reload::ReloadSet;
pub use view::{ProjectView, RecordingView};
