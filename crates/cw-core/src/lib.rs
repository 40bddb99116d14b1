//! Core types, errors, and utilities for cmake-workbench.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`ProjectInfo`] - the boundary struct describing one configured project
//! - [`ItemTree`] - the arena-backed project model installed into the view
//! - [`BuildAction`] - per-target build actions discovered during a parse
//! - Configuration structures and error types
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)
//!
//! The crate is pure data: no I/O, no async, no process execution. The
//! parser, watcher, pipeline, and orchestrator crates build on top of it.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod action;
pub mod config;
pub mod error;
pub mod hash;
pub mod project;
pub mod tree;

pub use action::BuildAction;
pub use config::{Config, ParserConfig, PipelineConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{fx_hash_map, fx_hash_set, FxBuildHasher, FxHashMap, FxHashSet};
pub use project::{ProjectInfo, ProjectKey, RootId, ToolchainKind};
pub use tree::{ItemTree, Node, NodeId, NodeKind, TreeError};
