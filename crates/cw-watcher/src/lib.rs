//! Descriptor watching and per-root change coalescing.
//!
//! This crate keeps a registry of descriptor files per project root and
//! turns raw filesystem notifications into coalesced "reload this root"
//! events for the orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  Debouncer Thread (notify)                 │
//! │  ┌──────────────────┐    ┌───────────────┐                 │
//! │  │ RecommendedWatcher│ -> │ ChangeRouter  │  path -> roots  │
//! │  │ per-file watches │    │ (coalescing)  │                 │
//! │  └──────────────────┘    └───────┬───────┘                 │
//! └──────────────────────────────────│─────────────────────────┘
//!                                    │ send
//!                                    ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Async Runtime (tokio)                    │
//! │  mpsc::UnboundedReceiver<RootChangeEvent> -> orchestrator  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The channel is unbounded but bounded in practice: coalescing admits at
//! most one unacknowledged event per root.
//!
//! # Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use cw_core::{RootId, WatchConfig};
//! use cw_watcher::{NotifyBackend, WatchKeeper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cw_watcher::WatchError> {
//!     let config = WatchConfig::default();
//!     let (mut keeper, mut events) =
//!         WatchKeeper::new(|router| NotifyBackend::new(&config, router))?;
//!
//!     let root = RootId::new(1);
//!     keeper.add_root_file(root, Utf8Path::new("/proj/CMakeLists.txt"))?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{} changed ({})", event.root, event.path);
//!         // reload, then:
//!         keeper.mark_consumed(event.root);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod events;
pub mod keeper;

pub use backend::{ManualBackend, NotifyBackend, WatchBackend};
pub use error::WatchError;
pub use events::{FileEvent, RootChangeEvent};
pub use keeper::{ChangeRouter, WatchKeeper};
