//! Root lifecycle and the reconfigure loop.
//!
//! [`Orchestrator`] owns every opened project root: its cached
//! [`ProjectInfo`], its worker pool, the installed tree, and the
//! discovered build actions. It wires the parser, the watch keeper, and
//! the build pipeline together:
//!
//! - `configure` runs the configure pipeline and, on success, (re)parses
//!   the project and installs the tree.
//! - descriptor changes stream in as [`RootChangeEvent`]s; `drive_changes`
//!   turns them into reconfigures, coalesced through the [`ReloadSet`].
//! - `remove_root` unregisters watches first, then drains the root's pool
//!   before releasing the tree; a parse finishing for a removed root is
//!   discarded.
//!
//! Pipeline completions are matched to their request by the token echoed
//! in the report; command-line text never identifies a request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, info, trace, warn};

use cw_core::{BuildAction, Config, FxHashMap, FxHashSet, ItemTree, ProjectInfo, ProjectKey, RootId};
use cw_parser::{enumerate_actions, ParseError, ParseOutcome, ProjectParser};
use cw_pipeline::{
    BuildKind, BuildList, BuildPipeline, BuildStep, CommandRunner, OutputSink, PipelineReport,
};
use cw_watcher::{RootChangeEvent, WatchBackend, WatchKeeper};

use crate::error::OrchestratorError;
use crate::events::ProjectEvent;
use crate::pool::{ParseJob, WorkerPool};
use crate::reload::ReloadSet;
use crate::view::ProjectView;

/// How deep installed trees are expanded in the view.
const EXPAND_DEPTH: usize = 2;

/// Result of a configure request.
#[derive(Debug)]
pub enum ConfigureOutcome {
    /// Configure succeeded; the root's parse has been queued.
    Completed {
        /// The root the configure applied to (existing or newly created).
        root: RootId,
        /// The pipeline report for the configure list.
        report: PipelineReport,
    },
    /// The configure pipeline failed; nothing was (re)parsed.
    Failed {
        /// The pipeline report describing the failure.
        report: PipelineReport,
    },
    /// A configure or parse for the same project is already running;
    /// this request was skipped.
    AlreadyInProgress {
        /// The root with work in flight, or `None` when the project's
        /// first configure has not created its root yet.
        root: Option<RootId>,
    },
}

/// Per-root bookkeeping.
struct RootState {
    info: ProjectInfo,
    pool: WorkerPool,
    tree: Option<Arc<ItemTree>>,
    actions: Vec<BuildAction>,
    parse: Option<ParseJob>,
    configure_in_flight: bool,
}

struct Inner<B: WatchBackend, R> {
    config: Config,
    next_root: AtomicU64,
    roots: Mutex<FxHashMap<RootId, RootState>>,
    /// Projects whose first configure is still running and has no root
    /// in the map yet. Guards against two concurrent first configures
    /// creating two roots for the same project.
    pending_keys: Mutex<FxHashSet<ProjectKey>>,
    reload_set: ReloadSet,
    keeper: Mutex<WatchKeeper<B>>,
    pipeline: BuildPipeline<R>,
    sink: Arc<dyn OutputSink>,
    view: Option<Arc<dyn ProjectView>>,
    events_tx: mpsc::UnboundedSender<ProjectEvent>,
}

/// Coordinates parsing, watching, and building for all opened roots.
///
/// Cheap to clone; clones share state. All operations take `&self`.
pub struct Orchestrator<B: WatchBackend, R> {
    inner: Arc<Inner<B, R>>,
}

impl<B: WatchBackend, R> Clone for Orchestrator<B, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: WatchBackend, R> std::fmt::Debug for Orchestrator<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("roots", &self.inner.roots.lock().len())
            .field("reloads_pending", &self.inner.reload_set.len())
            .finish_non_exhaustive()
    }
}

impl<B, R> Orchestrator<B, R>
where
    B: WatchBackend + Send + 'static,
    R: CommandRunner + 'static,
{
    /// Creates an orchestrator and its event receiver.
    #[must_use]
    pub fn new(
        config: Config,
        keeper: WatchKeeper<B>,
        pipeline: BuildPipeline<R>,
        sink: Arc<dyn OutputSink>,
        view: Option<Arc<dyn ProjectView>>,
    ) -> (Self, mpsc::UnboundedReceiver<ProjectEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            config,
            next_root: AtomicU64::new(1),
            roots: Mutex::new(FxHashMap::default()),
            pending_keys: Mutex::new(FxHashSet::default()),
            reload_set: ReloadSet::new(),
            keeper: Mutex::new(keeper),
            pipeline,
            sink,
            view,
            events_tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        )
    }

    /// Opens a new project root and queues its parse.
    ///
    /// Returns immediately; tree installation is signalled by
    /// [`ProjectEvent::TreeReady`] (or [`ProjectEvent::ParseFailed`]).
    pub fn create_root(&self, info: ProjectInfo) -> RootId {
        let root = RootId::new(self.inner.next_root.fetch_add(1, Ordering::Relaxed));
        let pool = WorkerPool::new(self.inner.config.pipeline.workers_per_root);
        self.inner.roots.lock().insert(
            root,
            RootState {
                info: info.clone(),
                pool,
                tree: None,
                actions: Vec::new(),
                parse: None,
                configure_in_flight: false,
            },
        );
        info!(%root, descriptor = %info.project_file, "Root created, parse queued");
        self.spawn_parse(root, info);
        root
    }

    /// Removes a root: watches first, then a full drain of its worker
    /// pool, then the tree.
    ///
    /// The drain is cooperative - an outstanding parse runs to completion
    /// and its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownRoot`] if the root was never
    /// created or is already removed.
    pub async fn remove_root(&self, root: RootId) -> Result<(), OrchestratorError> {
        self.inner.keeper.lock().remove_root(root);
        self.inner.reload_set.remove(root);

        let state = self
            .inner
            .roots
            .lock()
            .remove(&root)
            .ok_or(OrchestratorError::UnknownRoot(root))?;
        state.pool.drain().await;

        if let Some(view) = &self.inner.view {
            view.remove_root_item(root);
        }
        info!(%root, "Root removed");
        self.emit(ProjectEvent::RootRemoved { root });
        Ok(())
    }

    /// Runs the configure pipeline for a project and, on success, parses
    /// it and installs the tree (creating the root if needed).
    ///
    /// A configure for a project that already has a configure or parse in
    /// flight is skipped and reported as
    /// [`ConfigureOutcome::AlreadyInProgress`]. This holds before the
    /// project's first root exists too: concurrent first configures for
    /// the same project run the pipeline once and create one root.
    ///
    /// # Errors
    ///
    /// Currently infallible at this level; failures are expressed in the
    /// returned outcome and as events.
    pub async fn configure(
        &self,
        info: ProjectInfo,
    ) -> Result<ConfigureOutcome, OrchestratorError> {
        let key = info.key();
        let existing = {
            // Both checks under both locks: a project is busy if it has a
            // root with work in flight, or a first configure that has not
            // created its root yet.
            let mut pending = self.inner.pending_keys.lock();
            let mut roots = self.inner.roots.lock();
            match roots.iter_mut().find(|(_, state)| state.info.key() == key) {
                Some((id, state)) => {
                    if state.configure_in_flight {
                        debug!(root = %id, "Configure already in flight, skipping request");
                        return Ok(ConfigureOutcome::AlreadyInProgress { root: Some(*id) });
                    }
                    if state.parse.is_some() {
                        debug!(root = %id, "Parse outstanding, skipping configure request");
                        return Ok(ConfigureOutcome::AlreadyInProgress { root: Some(*id) });
                    }
                    state.configure_in_flight = true;
                    Some(*id)
                }
                None => {
                    if !pending.insert(key.clone()) {
                        debug!(%key, "First configure already running, skipping request");
                        return Ok(ConfigureOutcome::AlreadyInProgress { root: None });
                    }
                    None
                }
            }
        };

        let list = BuildList::new(BuildKind::Configure, vec![BuildStep::configure(&info)]);
        let token = list.token;
        info!(%token, command = %info.command_line(), "Configure started");
        let report = self.inner.pipeline.execute(&list, self.inner.sink.as_ref()).await;

        if let Some(root) = existing {
            if let Some(state) = self.inner.roots.lock().get_mut(&root) {
                state.configure_in_flight = false;
            }
            // The reload entry is cleared on pipeline completion, on the
            // success and failure paths both.
            self.inner.reload_set.remove(root);
            self.inner.keeper.lock().mark_consumed(root);
        }

        if report.succeeded() {
            let root = match existing {
                Some(root) => {
                    self.reload_root(root, info);
                    root
                }
                None => {
                    // create_root puts the root in the map before the key
                    // leaves the pending set, so the project is never
                    // momentarily unguarded.
                    let root = self.create_root(info);
                    self.inner.pending_keys.lock().remove(&key);
                    root
                }
            };
            Ok(ConfigureOutcome::Completed { root, report })
        } else {
            if existing.is_none() {
                self.inner.pending_keys.lock().remove(&key);
            }
            let message = report.failures.first().map_or_else(
                || "configure failed".to_owned(),
                |failure| match failure.exit_code {
                    Some(code) => format!("'{}' exited with code {code}", failure.command_line),
                    None => format!("'{}' could not run", failure.command_line),
                },
            );
            warn!(%token, %message, "Configure failed, cached info discarded");
            self.emit(ProjectEvent::ConfigureFailed { token, message });
            Ok(ConfigureOutcome::Failed { report })
        }
    }

    /// Accepts a descriptor change for `root` and starts a reconfigure,
    /// unless one is already pending (coalescing).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownRoot`] if the root has no
    /// cached project info (removed concurrently with the change).
    pub async fn on_file_changed(&self, root: RootId) -> Result<(), OrchestratorError> {
        if !self.inner.reload_set.insert(root) {
            trace!(%root, "Reconfigure already pending, change absorbed");
            return Ok(());
        }

        let info = self.inner.roots.lock().get(&root).map(|s| s.info.clone());
        let Some(info) = info else {
            self.inner.reload_set.remove(root);
            return Err(OrchestratorError::UnknownRoot(root));
        };

        info!(%root, "Descriptor change accepted, reconfiguring");
        self.configure(info).await.map(|_| ())
    }

    /// Consumes change events until the channel closes.
    ///
    /// Intended to be spawned once per keeper receiver.
    pub async fn drive_changes(&self, mut changes: mpsc::UnboundedReceiver<RootChangeEvent>) {
        while let Some(event) = changes.recv().await {
            debug!(root = %event.root, path = %event.path, "Descriptor change event");
            if let Err(error) = self.on_file_changed(event.root).await {
                warn!(root = %event.root, %error, "Could not start reconfigure");
            }
        }
    }

    /// Runs the given actions as one build list for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownRoot`] if the root does not
    /// exist.
    pub async fn run_actions(
        &self,
        root: RootId,
        kind: BuildKind,
        actions: &[BuildAction],
    ) -> Result<PipelineReport, OrchestratorError> {
        let info = self
            .cached_info(root)
            .ok_or(OrchestratorError::UnknownRoot(root))?;
        let steps = actions
            .iter()
            .map(|action| BuildStep::from_action(&info, action))
            .collect();
        let list = BuildList::new(kind, steps)
            .with_continue_on_failure(self.inner.config.pipeline.continue_on_failure);
        info!(token = %list.token, kind = kind.label(), %root, "Build list submitted");
        Ok(self.inner.pipeline.execute(&list, self.inner.sink.as_ref()).await)
    }

    /// Returns the installed tree for `root`, if a parse has completed.
    #[must_use]
    pub fn tree(&self, root: RootId) -> Option<Arc<ItemTree>> {
        self.inner.roots.lock().get(&root).and_then(|s| s.tree.clone())
    }

    /// Returns the build actions discovered for `root`.
    #[must_use]
    pub fn actions(&self, root: RootId) -> Vec<BuildAction> {
        self.inner
            .roots
            .lock()
            .get(&root)
            .map(|s| s.actions.clone())
            .unwrap_or_default()
    }

    /// Finds a discovered action by display name.
    #[must_use]
    pub fn find_action(&self, root: RootId, name: &str) -> Option<BuildAction> {
        self.inner
            .roots
            .lock()
            .get(&root)?
            .actions
            .iter()
            .find(|a| a.name == name)
            .cloned()
    }

    /// Returns the cached project info for `root`.
    #[must_use]
    pub fn cached_info(&self, root: RootId) -> Option<ProjectInfo> {
        self.inner.roots.lock().get(&root).map(|s| s.info.clone())
    }

    /// Looks up the root for a project key.
    #[must_use]
    pub fn root_for(&self, key: &ProjectKey) -> Option<RootId> {
        self.inner
            .roots
            .lock()
            .iter()
            .find(|(_, state)| state.info.key() == *key)
            .map(|(id, _)| *id)
    }

    /// Returns `true` while a reconfigure is pending for `root`.
    #[must_use]
    pub fn is_reload_pending(&self, root: RootId) -> bool {
        self.inner.reload_set.contains(root)
    }

    fn emit(&self, event: ProjectEvent) {
        if self.inner.events_tx.send(event).is_err() {
            trace!("No event consumer attached");
        }
    }

    /// Queues a parse for `root` on its worker pool.
    fn spawn_parse(&self, root: RootId, info: ProjectInfo) {
        let parser = ProjectParser::new(self.inner.config.parser.clone());
        let this = self.clone();

        let mut roots = self.inner.roots.lock();
        let Some(state) = roots.get_mut(&root) else {
            debug!(%root, "Parse requested for unknown root");
            return;
        };

        // Boxed so the closed reconfigure loop (parse completion may call
        // configure, which queues another parse) does not nest future
        // types without bound.
        let job: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let result = tokio::task::spawn_blocking(move || parser.parse(&info)).await;
            this.finish_parse(root, result).await;
        });
        state.pool.spawn(job);
        state.parse = Some(ParseJob { root });
    }

    async fn finish_parse(
        &self,
        root: RootId,
        result: Result<Result<ParseOutcome, ParseError>, JoinError>,
    ) {
        let alive = {
            match self.inner.roots.lock().get_mut(&root) {
                Some(state) => {
                    state.parse = None;
                    true
                }
                None => false,
            }
        };
        if !alive {
            debug!(%root, "Discarding parse result for removed root");
            return;
        }

        match result {
            Ok(Ok(outcome)) => self.install(root, outcome),
            Ok(Err(error)) => {
                warn!(%root, %error, "Parse failed, nothing installed");
                self.emit(ProjectEvent::ParseFailed {
                    root,
                    message: error.to_string(),
                });
            }
            Err(error) => warn!(%root, %error, "Parse task did not complete"),
        }

        // A change that arrived mid-parse was absorbed into the reload
        // set; pick it up now so the root cannot get stuck.
        if self.inner.reload_set.contains(root) {
            let info = self.inner.roots.lock().get(&root).map(|s| s.info.clone());
            if let Some(info) = info {
                debug!(%root, "Change arrived during parse, reconfiguring");
                if let Err(error) = self.configure(info).await {
                    warn!(%root, %error, "Deferred reconfigure failed to start");
                }
            }
        }
    }

    /// Installs a successful parse: tree, actions, watches, view, event.
    fn install(&self, root: RootId, outcome: ParseOutcome) {
        let actions = enumerate_actions(&outcome);
        let ParseOutcome {
            tree,
            targets,
            descriptor_files,
            ..
        } = outcome;
        let tree = Arc::new(tree);
        let nodes = tree.len();
        let target_count = targets.len();

        {
            let mut roots = self.inner.roots.lock();
            let Some(state) = roots.get_mut(&root) else {
                debug!(%root, "Root removed during install, discarding tree");
                return;
            };
            state.tree = Some(Arc::clone(&tree));
            state.actions = actions;
        }

        {
            let mut keeper = self.inner.keeper.lock();
            if let Some((root_file, sub_files)) = descriptor_files.split_first() {
                if let Err(error) = keeper.add_root_file(root, root_file) {
                    warn!(%root, %error, "Failed to watch root descriptor");
                }
                if let Err(error) = keeper.add_sub_files(root, sub_files) {
                    warn!(%root, %error, "Failed to watch descriptor files");
                }
            }
        }

        match &self.inner.view {
            Some(view) => {
                view.add_root_item(root, &tree);
                view.expand_to_depth(root, EXPAND_DEPTH);
                view.switch_to_view();
            }
            None => debug!(%root, "No project view attached"),
        }

        info!(%root, nodes, targets = target_count, "Project tree installed");
        self.emit(ProjectEvent::TreeReady {
            root,
            nodes,
            targets: target_count,
        });
    }

    /// Tears down a root's tree and watches, then queues a fresh parse
    /// with the (possibly updated) project info.
    fn reload_root(&self, root: RootId, info: ProjectInfo) {
        self.inner.keeper.lock().remove_root(root);
        if let Some(view) = &self.inner.view {
            view.remove_root_item(root);
        }
        {
            let mut roots = self.inner.roots.lock();
            if let Some(state) = roots.get_mut(&root) {
                state.info = info.clone();
                state.tree = None;
                state.actions.clear();
            }
        }
        info!(%root, "Reloading project tree");
        self.spawn_parse(root, info);
    }
}
