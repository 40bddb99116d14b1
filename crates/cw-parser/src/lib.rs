//! Project descriptor parsing for the CMake workbench.
//!
//! This crate turns a project's `CMakeLists.txt` hierarchy into the data
//! the orchestrator works with:
//!
//! - [`ProjectParser`] reads descriptors, follows `add_subdirectory`
//!   references in parallel, and produces a [`ParseOutcome`] with the
//!   populated item tree, discovered [`TargetInfo`]s, and the full list of
//!   descriptor files (which the watch keeper registers for the root).
//! - [`enumerate_actions`] derives the invocable [`cw_core::BuildAction`]s
//!   from a parse outcome.
//!
//! Parsing is synchronous and self-contained; callers run it on a blocking
//! worker when used from async code.
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use cw_core::{ParserConfig, ProjectInfo};
//! use cw_parser::{enumerate_actions, ProjectParser};
//!
//! let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"));
//! let parser = ProjectParser::new(ParserConfig::default());
//! let outcome = parser.parse(&info)?;
//! for action in enumerate_actions(&outcome) {
//!     println!("{}", action.name);
//! }
//! # Ok::<(), cw_parser::ParseError>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod actions;
pub mod error;
pub mod lexer;
pub mod parser;

pub use actions::enumerate_actions;
pub use error::ParseError;
pub use lexer::{lex, Command};
pub use parser::{ParseOutcome, ProjectParser, TargetInfo, TargetKind};
