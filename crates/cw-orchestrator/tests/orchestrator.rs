//! End-to-end orchestration tests over a real on-disk project, with the
//! manual watch backend and the scripted command runner standing in for
//! the OS notification source and real build tools.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{Config, ProjectInfo, RootId};
use cw_orchestrator::{ConfigureOutcome, Orchestrator, ProjectEvent, RecordingView};
use cw_pipeline::{
    BufferSink, BuildKind, BuildPipeline, BuildStep, CommandRunner, OutputFormat, OutputSink,
    PipelineError, ScriptedRunner,
};
use cw_watcher::{ManualBackend, WatchKeeper};
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, Semaphore};

const ROOT_DESCRIPTOR: &str =
    "project(demo)\ninclude(opts.cmake)\nadd_subdirectory(lib)\nadd_executable(app main.c)\n";
const OPTS: &str = "set(OPT 1)\n";
const LIB_DESCRIPTOR: &str = "add_library(core STATIC core.c)\n";

struct Harness {
    orchestrator: Orchestrator<ManualBackend, ScriptedRunner>,
    backend: ManualBackend,
    runner: ScriptedRunner,
    view: RecordingView,
    sink: BufferSink,
    events: mpsc::UnboundedReceiver<ProjectEvent>,
    root_dir: Utf8PathBuf,
    _project: tempfile::TempDir,
}

fn write_project(files: &[(&str, &str)]) -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::TempDir::new().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let root = Utf8PathBuf::from_path_buf(canonical).unwrap();
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    (dir, root)
}

fn harness(files: &[(&str, &str)]) -> Harness {
    let (project, root_dir) = write_project(files);

    let mut backend_slot = None;
    let (keeper, changes) = WatchKeeper::new(|router| {
        let backend = ManualBackend::new(router);
        backend_slot = Some(backend.clone());
        Ok(backend)
    })
    .unwrap();

    let runner = ScriptedRunner::new();
    let view = RecordingView::new();
    let sink = BufferSink::new();
    let (orchestrator, events) = Orchestrator::new(
        Config::default(),
        keeper,
        BuildPipeline::new(runner.clone()),
        Arc::new(sink.clone()),
        Some(Arc::new(view.clone())),
    );

    let driver = orchestrator.clone();
    tokio::spawn(async move { driver.drive_changes(changes).await });

    Harness {
        orchestrator,
        backend: backend_slot.unwrap(),
        runner,
        view,
        sink,
        events,
        root_dir,
        _project: project,
    }
}

fn project_info(root_dir: &Utf8Path) -> ProjectInfo {
    ProjectInfo::new("cmake", &root_dir.join("CMakeLists.txt"))
        .with_build_program("cmake")
        .with_build_args(["-S", ".", "-B", "build"])
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ProjectEvent>) -> ProjectEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn wait_tree_ready(events: &mut mpsc::UnboundedReceiver<ProjectEvent>) -> (RootId, usize) {
    loop {
        if let ProjectEvent::TreeReady { root, nodes, .. } = next_event(events).await {
            return (root, nodes);
        }
    }
}

#[tokio::test]
async fn test_configure_installs_tree_and_registers_watches() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);

    let outcome = h
        .orchestrator
        .configure(project_info(&h.root_dir))
        .await
        .unwrap();
    let ConfigureOutcome::Completed { root, report } = outcome else {
        panic!("expected completed configure, got {outcome:?}");
    };
    assert!(report.succeeded());
    assert_eq!(h.runner.command_lines(), ["cmake -S . -B build"]);

    let (ready_root, nodes) = wait_tree_ready(&mut h.events).await;
    assert_eq!(ready_root, root);
    assert!(nodes > 1);

    assert_eq!(h.view.added().len(), 1);
    assert_eq!(h.view.expanded(), [(root, 2)]);
    assert_eq!(h.view.switches(), 1);

    // all three descriptor files watched
    assert!(h.backend.is_watching(&h.root_dir.join("CMakeLists.txt")));
    assert!(h.backend.is_watching(&h.root_dir.join("opts.cmake")));
    assert!(h.backend.is_watching(&h.root_dir.join("lib/CMakeLists.txt")));

    // diagnostics narrate the configure step
    let diags = h.sink.lines_with(OutputFormat::Diagnostic);
    assert!(diags.iter().any(|l| l.contains("cmake -S . -B build")));

    // discovered actions include defaults and targets
    let names: Vec<String> = h
        .orchestrator
        .actions(root)
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert!(names.contains(&"build all".to_owned()));
    assert!(names.contains(&"clean".to_owned()));
    assert!(names.contains(&"build app".to_owned()));
    assert!(names.contains(&"build core".to_owned()));
}

#[tokio::test]
async fn test_descriptor_change_triggers_exactly_one_reconfigure() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);

    let ConfigureOutcome::Completed { root, .. } = h
        .orchestrator
        .configure(project_info(&h.root_dir))
        .await
        .unwrap()
    else {
        panic!("configure did not complete");
    };
    wait_tree_ready(&mut h.events).await;

    // a burst of changes before the reload is consumed
    let descriptor = h.root_dir.join("CMakeLists.txt");
    h.backend.emit(&descriptor);
    h.backend.emit(&descriptor);
    h.backend.emit(&h.root_dir.join("lib/CMakeLists.txt"));

    let (ready_root, _) = wait_tree_ready(&mut h.events).await;
    assert_eq!(ready_root, root);

    // one reconfigure for the whole burst: configure ran exactly twice
    assert_eq!(h.runner.command_lines().len(), 2);
    // old tree torn down, new one installed
    assert_eq!(h.view.removed(), [root]);
    assert_eq!(h.view.added().len(), 2);
    assert!(!h.orchestrator.is_reload_pending(root));

    // the root is re-armed: a later change starts a fresh cycle
    h.backend.emit(&descriptor);
    wait_tree_ready(&mut h.events).await;
    assert_eq!(h.runner.command_lines().len(), 3);
}

#[tokio::test]
async fn test_configure_failure_installs_nothing() {
    let mut h = harness(&[("CMakeLists.txt", ROOT_DESCRIPTOR), ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR)]);
    h.runner.push_exit_code(1);

    let info = project_info(&h.root_dir);
    let key = info.key();
    let outcome = h.orchestrator.configure(info).await.unwrap();
    let ConfigureOutcome::Failed { report } = outcome else {
        panic!("expected failed configure, got {outcome:?}");
    };
    assert!(!report.succeeded());

    match next_event(&mut h.events).await {
        ProjectEvent::ConfigureFailed { token, message } => {
            assert_eq!(token, report.token);
            assert!(message.contains("exited with code 1"));
        }
        other => panic!("expected ConfigureFailed, got {other:?}"),
    }

    assert!(h.view.added().is_empty());
    assert!(!h.backend.is_watching(&h.root_dir.join("CMakeLists.txt")));
    assert!(h.orchestrator.root_for(&key).is_none());
}

#[tokio::test]
async fn test_parse_failure_emits_event_and_registers_nothing() {
    // unbalanced parenthesis in the root descriptor
    let mut h = harness(&[("CMakeLists.txt", "add_executable(app main.c\n")]);

    let ConfigureOutcome::Completed { root, .. } = h
        .orchestrator
        .configure(project_info(&h.root_dir))
        .await
        .unwrap()
    else {
        panic!("configure did not complete");
    };

    match next_event(&mut h.events).await {
        ProjectEvent::ParseFailed { root: failed, message } => {
            assert_eq!(failed, root);
            assert!(message.contains("syntax error"));
        }
        other => panic!("expected ParseFailed, got {other:?}"),
    }

    assert!(h.view.added().is_empty());
    assert!(!h.backend.is_watching(&h.root_dir.join("CMakeLists.txt")));
    assert!(h.orchestrator.tree(root).is_none());
}

#[tokio::test]
async fn test_remove_root_drains_and_leaves_no_registrations() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);

    let ConfigureOutcome::Completed { root, .. } = h
        .orchestrator
        .configure(project_info(&h.root_dir))
        .await
        .unwrap()
    else {
        panic!("configure did not complete");
    };
    wait_tree_ready(&mut h.events).await;

    h.orchestrator.remove_root(root).await.unwrap();

    match next_event(&mut h.events).await {
        ProjectEvent::RootRemoved { root: removed } => assert_eq!(removed, root),
        other => panic!("expected RootRemoved, got {other:?}"),
    }
    assert!(h.view.removed().contains(&root));
    assert!(!h.backend.is_watching(&h.root_dir.join("CMakeLists.txt")));
    assert!(!h.backend.is_watching(&h.root_dir.join("opts.cmake")));
    assert!(!h.backend.is_watching(&h.root_dir.join("lib/CMakeLists.txt")));

    // a change after removal goes nowhere
    h.backend.emit(&h.root_dir.join("CMakeLists.txt"));
    assert_eq!(h.runner.command_lines().len(), 1);

    // removal is not repeatable
    assert!(h.orchestrator.remove_root(root).await.is_err());
}

#[tokio::test]
async fn test_remove_root_with_outstanding_parse_discards_result() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);

    // create_root queues the parse; on the current-thread test runtime it
    // has not started yet when remove_root begins draining
    let root = h.orchestrator.create_root(project_info(&h.root_dir));
    h.orchestrator.remove_root(root).await.unwrap();

    assert!(h.orchestrator.tree(root).is_none());
    assert!(!h.backend.is_watching(&h.root_dir.join("CMakeLists.txt")));

    // only the removal event arrives, never a TreeReady for this root
    match next_event(&mut h.events).await {
        ProjectEvent::RootRemoved { root: removed } => assert_eq!(removed, root),
        other => panic!("expected RootRemoved, got {other:?}"),
    }
    assert!(h.view.added().is_empty());
}

#[tokio::test]
async fn test_configure_skipped_while_parse_outstanding() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);
    let info = project_info(&h.root_dir);

    let ConfigureOutcome::Completed { root, .. } =
        h.orchestrator.configure(info.clone()).await.unwrap()
    else {
        panic!("configure did not complete");
    };

    // the parse spawned by the first configure has not run yet; a second
    // configure for the same project observes it and skips
    let outcome = h.orchestrator.configure(info.clone()).await.unwrap();
    let ConfigureOutcome::AlreadyInProgress { root: busy } = outcome else {
        panic!("expected skip, got {outcome:?}");
    };
    assert_eq!(busy, Some(root));
    assert_eq!(h.runner.command_lines().len(), 1, "no second pipeline run");

    // once the parse settles, configuring again works
    wait_tree_ready(&mut h.events).await;
    let outcome = h.orchestrator.configure(info).await.unwrap();
    assert!(matches!(outcome, ConfigureOutcome::Completed { .. }));
    wait_tree_ready(&mut h.events).await;
}

/// Runner whose steps block until the test releases them, so a test can
/// observe the orchestrator while a pipeline is mid-flight.
#[derive(Clone)]
struct StallingRunner {
    gate: Arc<Semaphore>,
}

impl StallingRunner {
    fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

impl CommandRunner for StallingRunner {
    fn run<'a>(
        &'a self,
        _step: &'a BuildStep,
        _sink: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<i32, PipelineError>> {
        Box::pin(async move {
            let Ok(_permit) = self.gate.acquire().await else {
                return Ok(0);
            };
            Ok(0)
        })
    }
}

#[tokio::test]
async fn test_concurrent_first_configures_create_one_root() {
    let (_project, root_dir) = write_project(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);
    let (keeper, _changes) = WatchKeeper::new(|router| Ok(ManualBackend::new(router))).unwrap();
    let runner = StallingRunner::new();
    let (orchestrator, mut events) = Orchestrator::new(
        Config::default(),
        keeper,
        BuildPipeline::new(runner.clone()),
        Arc::new(BufferSink::new()),
        None,
    );

    let info = project_info(&root_dir);
    let key = info.key();

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let info = info.clone();
        async move { orchestrator.configure(info).await }
    });
    // let the first configure reach its stalled pipeline step
    tokio::task::yield_now().await;

    // no root exists yet; a second configure for the same project must
    // still be skipped, not run the pipeline again
    let outcome = orchestrator.configure(info).await.unwrap();
    assert!(
        matches!(outcome, ConfigureOutcome::AlreadyInProgress { root: None }),
        "expected skip, got {outcome:?}"
    );

    runner.release_one();
    let outcome = first.await.unwrap().unwrap();
    let ConfigureOutcome::Completed { root, .. } = outcome else {
        panic!("first configure did not complete, got {outcome:?}");
    };

    let (ready_root, _) = wait_tree_ready(&mut events).await;
    assert_eq!(ready_root, root);
    assert_eq!(orchestrator.root_for(&key), Some(root));
    assert!(
        events.try_recv().is_err(),
        "exactly one root may be installed"
    );
}

#[tokio::test]
async fn test_build_actions_run_as_one_list() {
    let mut h = harness(&[
        ("CMakeLists.txt", ROOT_DESCRIPTOR),
        ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR),
    ]);

    let ConfigureOutcome::Completed { root, .. } = h
        .orchestrator
        .configure(project_info(&h.root_dir))
        .await
        .unwrap()
    else {
        panic!("configure did not complete");
    };
    wait_tree_ready(&mut h.events).await;

    let clean = h.orchestrator.find_action(root, "clean").unwrap();
    let build = h.orchestrator.find_action(root, "build all").unwrap();
    let report = h
        .orchestrator
        .run_actions(root, BuildKind::Build, &[clean, build])
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.steps_run, 2);
    let commands = h.runner.command_lines();
    // configure, then clean, then build - with the project build program
    assert_eq!(commands[1], "cmake clean");
    assert_eq!(commands[2], "cmake all");
}

#[tokio::test]
async fn test_operations_on_unknown_root_fail() {
    let h = harness(&[("CMakeLists.txt", ROOT_DESCRIPTOR), ("opts.cmake", OPTS),
        ("lib/CMakeLists.txt", LIB_DESCRIPTOR)]);
    let ghost = RootId::new(999);

    assert!(h.orchestrator.remove_root(ghost).await.is_err());
    assert!(h.orchestrator.on_file_changed(ghost).await.is_err());
    assert!(!h.orchestrator.is_reload_pending(ghost), "failed change must not leave a pending mark");
    assert!(h
        .orchestrator
        .run_actions(ghost, BuildKind::Build, &[])
        .await
        .is_err());
}
