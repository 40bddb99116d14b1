//! The watch keeper: per-root descriptor registration and coalescing.
//!
//! [`WatchKeeper`] owns the mapping between watched descriptor files and
//! the project roots that registered them. A file may belong to several
//! roots (nested projects sharing an included `.cmake` file); a change to
//! it raises one [`RootChangeEvent`] per owning root.
//!
//! # Coalescing
//!
//! Each root carries a pending flag. The first change for a root emits an
//! event and sets the flag; further changes while the flag is set are
//! absorbed. The consumer acknowledges with [`WatchKeeper::mark_consumed`]
//! once it has started the reload, re-arming the root. This bounds the
//! event channel at one in-flight event per root, which is why an
//! unbounded channel is safe here.
//!
//! # Locking
//!
//! One mutex guards the whole registry. It is taken briefly from the
//! keeper's own methods and from the backend's callback thread; nothing
//! blocks while holding it.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{FxHashMap, FxHashSet, RootId};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::backend::WatchBackend;
use crate::error::WatchError;
use crate::events::{FileEvent, RootChangeEvent};

/// Registry state shared between the keeper and the router.
#[derive(Default)]
struct Registry {
    /// Which roots registered each watched file. Two inline slots cover
    /// the common case of a file owned by one or two roots.
    roots_by_path: FxHashMap<Utf8PathBuf, SmallVec<[RootId; 2]>>,
    /// Reverse index, used for root removal.
    paths_by_root: FxHashMap<RootId, FxHashSet<Utf8PathBuf>>,
    /// Roots with an unacknowledged change event in flight.
    pending: FxHashSet<RootId>,
}

/// Routes raw file events to owning roots, applying coalescing.
///
/// Cloneable and callable from any thread; the backend invokes it from
/// its callback context.
#[derive(Clone)]
pub struct ChangeRouter {
    registry: Arc<Mutex<Registry>>,
    tx: mpsc::UnboundedSender<RootChangeEvent>,
}

impl std::fmt::Debug for ChangeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRouter").finish_non_exhaustive()
    }
}

impl ChangeRouter {
    /// Routes one file event to every root that registered its path.
    pub fn route(&self, event: FileEvent) {
        let mut registry = self.registry.lock();
        let Some(roots) = registry.roots_by_path.get(&event.path).cloned() else {
            trace!(path = %event.path, "Change event for unregistered path");
            return;
        };

        for root in roots {
            if registry.pending.insert(root) {
                debug!(%root, path = %event.path, "Root change event raised");
                if self.tx.send(RootChangeEvent::new(root, &event.path)).is_err() {
                    // Consumer is gone; don't leave the root stuck pending.
                    registry.pending.remove(&root);
                    warn!(%root, "Change event channel closed");
                }
            } else {
                trace!(%root, path = %event.path, "Change coalesced into pending event");
            }
        }
    }
}

/// Tracks which descriptor files belong to which project roots and turns
/// file changes into per-root, coalesced reload notifications.
///
/// # Examples
///
/// ```no_run
/// use cw_core::{RootId, WatchConfig};
/// use cw_watcher::{NotifyBackend, WatchKeeper};
/// use camino::Utf8Path;
///
/// # fn example() -> Result<(), cw_watcher::WatchError> {
/// let config = WatchConfig::default();
/// let (mut keeper, mut events) = WatchKeeper::new(|router| NotifyBackend::new(&config, router))?;
///
/// let root = RootId::new(1);
/// keeper.add_root_file(root, Utf8Path::new("/proj/CMakeLists.txt"))?;
/// # Ok(())
/// # }
/// ```
pub struct WatchKeeper<B: WatchBackend> {
    backend: B,
    registry: Arc<Mutex<Registry>>,
}

impl<B: WatchBackend> std::fmt::Debug for WatchKeeper<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("WatchKeeper")
            .field("watched_files", &registry.roots_by_path.len())
            .field("roots", &registry.paths_by_root.len())
            .finish_non_exhaustive()
    }
}

impl<B: WatchBackend> WatchKeeper<B> {
    /// Creates a keeper and its change event receiver.
    ///
    /// `make_backend` is handed the [`ChangeRouter`] the backend must
    /// deliver events through.
    ///
    /// # Errors
    ///
    /// Returns whatever error the backend factory produces.
    pub fn new<F>(
        make_backend: F,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RootChangeEvent>), WatchError>
    where
        F: FnOnce(ChangeRouter) -> Result<B, WatchError>,
    {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let router = ChangeRouter {
            registry: Arc::clone(&registry),
            tx,
        };
        let backend = make_backend(router)?;
        Ok((Self { backend, registry }, rx))
    }

    /// Registers the root descriptor file for a root.
    ///
    /// Registration is idempotent per `(root, path)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the backend rejects the path; the
    /// registry is left unchanged in that case.
    pub fn add_root_file(&mut self, root: RootId, path: &Utf8Path) -> Result<(), WatchError> {
        self.register(root, path)
    }

    /// Registers subdirectory and included descriptor files for a root.
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered; files registered
    /// before the failure stay registered.
    pub fn add_sub_files(&mut self, root: RootId, paths: &[Utf8PathBuf]) -> Result<(), WatchError> {
        for path in paths {
            self.register(root, path)?;
        }
        Ok(())
    }

    /// Removes every registration belonging to `root`.
    ///
    /// Files still registered by other roots stay watched; orphaned files
    /// are unwatched best-effort. Removing an unknown root is a no-op.
    pub fn remove_root(&mut self, root: RootId) {
        let orphaned = {
            let mut registry = self.registry.lock();
            registry.pending.remove(&root);
            let Some(paths) = registry.paths_by_root.remove(&root) else {
                return;
            };

            let mut orphaned = Vec::new();
            for path in paths {
                let now_empty = registry.roots_by_path.get_mut(&path).is_some_and(|roots| {
                    roots.retain(|r| *r != root);
                    roots.is_empty()
                });
                if now_empty {
                    registry.roots_by_path.remove(&path);
                    orphaned.push(path);
                }
            }
            orphaned
        };

        for path in orphaned {
            if let Err(error) = self.backend.unwatch(&path) {
                warn!(path = %path, %error, "Failed to unwatch orphaned file");
            }
        }
        debug!(%root, "Root removed from watch registry");
    }

    /// Acknowledges the in-flight change event for `root`, re-arming it.
    ///
    /// Returns `true` if an event was actually pending.
    pub fn mark_consumed(&self, root: RootId) -> bool {
        self.registry.lock().pending.remove(&root)
    }

    /// Returns the files currently registered for `root`, sorted.
    #[must_use]
    pub fn watched_paths(&self, root: RootId) -> Vec<Utf8PathBuf> {
        let registry = self.registry.lock();
        let mut paths: Vec<Utf8PathBuf> = registry
            .paths_by_root
            .get(&root)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        paths.sort_unstable();
        paths
    }

    /// Returns a handle to the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn register(&mut self, root: RootId, path: &Utf8Path) -> Result<(), WatchError> {
        // Canonicalize so registry keys match the paths the OS reports.
        let path = path.canonicalize_utf8().unwrap_or_else(|_| path.to_owned());

        let tracked = {
            let registry = self.registry.lock();
            if registry
                .roots_by_path
                .get(&path)
                .is_some_and(|roots| roots.contains(&root))
            {
                return Ok(());
            }
            registry.roots_by_path.contains_key(&path)
        };

        // Watch before touching the registry so a backend failure leaves
        // the registration absent rather than half-applied.
        if !tracked {
            self.backend.watch(&path)?;
        }

        let mut registry = self.registry.lock();
        registry
            .roots_by_path
            .entry(path.clone())
            .or_default()
            .push(root);
        registry.paths_by_root.entry(root).or_default().insert(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ManualBackend;

    fn manual_keeper() -> (
        WatchKeeper<ManualBackend>,
        ManualBackend,
        mpsc::UnboundedReceiver<RootChangeEvent>,
    ) {
        let mut handle = None;
        let (keeper, rx) = WatchKeeper::new(|router| {
            let backend = ManualBackend::new(router);
            handle = Some(backend.clone());
            Ok(backend)
        })
        .unwrap();
        (keeper, handle.unwrap(), rx)
    }

    fn path(s: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(s)
    }

    #[test]
    fn test_change_raises_one_event_per_root() {
        let (mut keeper, backend, mut rx) = manual_keeper();
        let root = RootId::new(1);
        keeper.add_root_file(root, &path("/p/CMakeLists.txt")).unwrap();

        backend.emit(&path("/p/CMakeLists.txt"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.root, root);
        assert_eq!(event.path, path("/p/CMakeLists.txt"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_changes_coalesce_until_consumed() {
        let (mut keeper, backend, mut rx) = manual_keeper();
        let root = RootId::new(1);
        keeper.add_root_file(root, &path("/p/CMakeLists.txt")).unwrap();
        keeper
            .add_sub_files(root, &[path("/p/lib/CMakeLists.txt")])
            .unwrap();

        backend.emit(&path("/p/CMakeLists.txt"));
        backend.emit(&path("/p/lib/CMakeLists.txt"));
        backend.emit(&path("/p/CMakeLists.txt"));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "later changes must coalesce");

        assert!(keeper.mark_consumed(root));
        backend.emit(&path("/p/lib/CMakeLists.txt"));
        assert!(rx.try_recv().is_ok(), "consumed root re-arms");
    }

    #[test]
    fn test_shared_file_notifies_every_owner() {
        let (mut keeper, backend, mut rx) = manual_keeper();
        let (a, b) = (RootId::new(1), RootId::new(2));
        let shared = path("/common/options.cmake");
        keeper.add_sub_files(a, std::slice::from_ref(&shared)).unwrap();
        keeper.add_sub_files(b, std::slice::from_ref(&shared)).unwrap();

        backend.emit(&shared);
        let mut roots = vec![rx.try_recv().unwrap().root, rx.try_recv().unwrap().root];
        roots.sort_unstable();
        assert_eq!(roots, [a, b]);
    }

    #[test]
    fn test_remove_root_silences_and_unwatches() {
        let (mut keeper, backend, mut rx) = manual_keeper();
        let (a, b) = (RootId::new(1), RootId::new(2));
        let shared = path("/common/options.cmake");
        let own = path("/a/CMakeLists.txt");
        keeper.add_root_file(a, &own).unwrap();
        keeper.add_sub_files(a, std::slice::from_ref(&shared)).unwrap();
        keeper.add_sub_files(b, std::slice::from_ref(&shared)).unwrap();

        keeper.remove_root(a);

        // a's own file is orphaned and unwatched; the shared one survives
        assert!(!backend.is_watching(&own));
        assert!(backend.is_watching(&shared));

        backend.emit(&own);
        backend.emit(&shared);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.root, b);
        assert!(rx.try_recv().is_err());

        // removal is idempotent
        keeper.remove_root(a);
    }

    #[test]
    fn test_registration_is_idempotent() {
        let (mut keeper, backend, mut rx) = manual_keeper();
        let root = RootId::new(1);
        let file = path("/p/CMakeLists.txt");
        keeper.add_root_file(root, &file).unwrap();
        keeper.add_root_file(root, &file).unwrap();

        assert_eq!(keeper.watched_paths(root).len(), 1);
        backend.emit(&file);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unregistered_path_is_ignored() {
        // keep a router handle so events can bypass the backend's own
        // filtering and hit the router's guard
        let mut router_slot = None;
        let (mut keeper, mut rx) = WatchKeeper::new(|router| {
            router_slot = Some(router.clone());
            Ok(ManualBackend::new(router))
        })
        .unwrap();
        let router = router_slot.unwrap();
        keeper
            .add_root_file(RootId::new(1), &path("/p/CMakeLists.txt"))
            .unwrap();

        router.route(FileEvent::new(path("/elsewhere/CMakeLists.txt")));
        assert!(rx.try_recv().is_err(), "unregistered path must not raise an event");

        router.route(FileEvent::new(path("/p/CMakeLists.txt")));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_mark_consumed_without_pending() {
        let (keeper, _backend, _rx) = manual_keeper();
        assert!(!keeper.mark_consumed(RootId::new(9)));
    }

    #[tokio::test]
    async fn test_notify_backend_delivers_debounced_changes() {
        use std::time::Duration;

        use cw_core::WatchConfig;

        use crate::backend::NotifyBackend;

        let dir = tempfile::TempDir::new().unwrap();
        let root_dir =
            Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        let file = root_dir.join("CMakeLists.txt");
        std::fs::write(&file, "project(demo)\n").unwrap();

        let config = WatchConfig { debounce_ms: 50 };
        let (mut keeper, mut rx) =
            WatchKeeper::new(|router| NotifyBackend::new(&config, router)).unwrap();
        let root = RootId::new(1);
        keeper.add_root_file(root, &file).unwrap();

        std::fs::write(&file, "project(demo)\nadd_executable(app main.c)\n").unwrap();
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for debounced change")
            .expect("change channel closed");
        assert_eq!(event.root, root);
        assert_eq!(event.path, file);

        // acknowledged root re-arms for the next change
        assert!(keeper.mark_consumed(root));
        std::fs::write(&file, "project(demo)\n").unwrap();
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for second change")
            .expect("change channel closed");
        assert_eq!(event.root, root);
    }
}
