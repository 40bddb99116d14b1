//! Watch backends: the seam between the keeper and the OS notification API.
//!
//! [`WatchBackend`] abstracts "start/stop watching one file". The real
//! implementation is [`NotifyBackend`], which owns a `notify` debouncer and
//! routes debounced events through the keeper's [`ChangeRouter`] from the
//! debouncer's callback thread. [`ManualBackend`] is an in-memory backend
//! for driving the keeper deterministically in tests.
//!
//! Descriptor files are registered individually and non-recursively; the
//! keeper never watches whole directory trees.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{FxHashSet, WatchConfig};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::WatchError;
use crate::events::FileEvent;
use crate::keeper::ChangeRouter;

/// Registers and unregisters individual files with a notification source.
pub trait WatchBackend {
    /// Starts watching one file, non-recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the path does not exist or the
    /// underlying watcher rejects it.
    fn watch(&mut self, path: &Utf8Path) -> Result<(), WatchError>;

    /// Stops watching one file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the underlying watcher fails; the
    /// keeper treats unwatch failures as best-effort.
    fn unwatch(&mut self, path: &Utf8Path) -> Result<(), WatchError>;
}

/// Production backend built on `notify` with debouncing.
///
/// The debouncer runs its callback on a dedicated thread owned by `notify`;
/// the callback converts paths to UTF-8 and hands events to the router,
/// which does registry lookup and coalescing. Dropping the backend stops
/// the debouncer thread.
pub struct NotifyBackend {
    debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Creates a backend that feeds debounced events into `router`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the watcher fails to initialize.
    pub fn new(config: &WatchConfig, router: ChangeRouter) -> Result<Self, WatchError> {
        let timeout = Duration::from_millis(config.debounce_ms);
        let debouncer = new_debouncer(timeout, move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    match Utf8PathBuf::try_from(event.path) {
                        Ok(path) => router.route(FileEvent::new(path)),
                        Err(e) => {
                            warn!(
                                path = %e.into_path_buf().display(),
                                "Skipping non-UTF-8 path in change event"
                            );
                        }
                    }
                }
            }
            Err(error) => warn!(error = %error, "Debouncer error"),
        })?;

        Ok(Self { debouncer })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }
        self.debouncer
            .watcher()
            .watch(path.as_std_path(), RecursiveMode::NonRecursive)?;
        trace!(path = %path, "Watch registered");
        Ok(())
    }

    fn unwatch(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.debouncer.watcher().unwatch(path.as_std_path())?;
        trace!(path = %path, "Watch removed");
        Ok(())
    }
}

/// In-memory backend for deterministic tests.
///
/// Records which paths are watched and delivers events only when
/// [`ManualBackend::emit`] is called. Clones share state, so a test can
/// keep a handle after handing the backend to the keeper.
#[derive(Clone)]
pub struct ManualBackend {
    inner: Arc<Mutex<ManualState>>,
    router: ChangeRouter,
}

struct ManualState {
    watched: FxHashSet<Utf8PathBuf>,
}

impl std::fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualBackend")
            .field("watched", &self.inner.lock().watched.len())
            .finish_non_exhaustive()
    }
}

impl ManualBackend {
    /// Creates a manual backend routing into `router`.
    #[must_use]
    pub fn new(router: ChangeRouter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                watched: FxHashSet::default(),
            })),
            router,
        }
    }

    /// Delivers a change event for `path`, as the OS would.
    ///
    /// Events for paths that are not watched are dropped, matching the
    /// behavior of a real notification source.
    pub fn emit(&self, path: &Utf8Path) {
        if self.inner.lock().watched.contains(path) {
            self.router.route(FileEvent::new(path.to_owned()));
        }
    }

    /// Returns `true` if `path` is currently watched.
    #[must_use]
    pub fn is_watching(&self, path: &Utf8Path) -> bool {
        self.inner.lock().watched.contains(path)
    }
}

impl WatchBackend for ManualBackend {
    fn watch(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.inner.lock().watched.insert(path.to_owned());
        Ok(())
    }

    fn unwatch(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.inner.lock().watched.remove(path);
        Ok(())
    }
}
