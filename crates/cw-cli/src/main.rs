//! `cwb` - command-line front end for the CMake workbench.
//!
//! Wires the watch keeper, the build pipeline, and the orchestrator
//! together around one project root and exposes the build lifecycle as
//! subcommands: `configure`, `build`, `clean`, `rebuild`, and `watch`.

use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cw_core::{BuildAction, Config, ProjectInfo, RootId};
use cw_orchestrator::{ConfigureOutcome, Orchestrator, ProjectEvent};
use cw_pipeline::{BuildKind, BuildPipeline, OutputFormat, OutputSink, PipelineReport, ProcessRunner};
use cw_watcher::{NotifyBackend, RootChangeEvent, WatchKeeper};

// =============================================================================
// CLI DEFINITION
// =============================================================================

#[derive(Parser)]
#[command(name = "cwb")]
#[command(version, about = "CMake project model and build orchestration", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the top-level CMakeLists.txt (defaults to ./CMakeLists.txt)
    #[arg(short, long, global = true, env = "CWB_PROJECT")]
    project: Option<Utf8PathBuf>,

    /// Build output directory (defaults to <root>/build)
    #[arg(short = 'B', long, global = true, env = "CWB_BUILD_DIR")]
    build_dir: Option<Utf8PathBuf>,

    /// Build program to invoke (defaults to cmake)
    #[arg(long, global = true, env = "CWB_PROGRAM")]
    program: Option<String>,

    /// Extra argument for the configure step (repeatable)
    #[arg(long = "build-arg", global = true)]
    build_args: Vec<String>,

    /// Keep running later steps after one fails
    #[arg(short = 'k', long, global = true)]
    keep_going: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configure step and install the project model
    Configure,

    /// Build the given targets (defaults to the whole project)
    Build {
        /// Target names to build
        targets: Vec<String>,
    },

    /// Run the clean action
    Clean,

    /// Clean, then build the whole project
    Rebuild,

    /// Configure, then reconfigure automatically on descriptor changes
    Watch,
}

// =============================================================================
// SETUP
// =============================================================================

fn init_tracing(verbose: bool, no_color: bool) {
    let default_filter = if verbose {
        "cwb=debug,cw_core=debug,cw_parser=debug,cw_watcher=debug,cw_pipeline=debug,\
         cw_orchestrator=debug,notify=warn"
    } else {
        "cwb=info,cw_core=info,cw_parser=info,cw_watcher=info,cw_pipeline=info,\
         cw_orchestrator=info,notify=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds the project description from CLI flags, validating paths.
fn build_info(cli: &Cli) -> color_eyre::Result<ProjectInfo> {
    let project = cli
        .project
        .clone()
        .unwrap_or_else(|| Utf8PathBuf::from("CMakeLists.txt"));
    if !project.is_file() {
        return Err(eyre!("project descriptor not found: {project}"));
    }
    let project = project
        .canonicalize_utf8()
        .map_err(|e| eyre!("cannot canonicalize {project}: {e}"))?;

    let program = cli.program.clone().unwrap_or_else(|| "cmake".to_owned());
    let build_args = if cli.build_args.is_empty() {
        let build_dir = cli
            .build_dir
            .as_ref()
            .map_or_else(|| "build".to_owned(), ToString::to_string);
        vec!["-S".to_owned(), ".".to_owned(), "-B".to_owned(), build_dir]
    } else {
        cli.build_args.clone()
    };

    let mut info = ProjectInfo::new("cmake", &project)
        .with_build_program(program)
        .with_build_args(build_args);
    if let Some(dir) = &cli.build_dir {
        info = info.with_build_dir(dir);
    }
    Ok(info)
}

/// Sink that forwards build output straight to the terminal.
struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write_line(&self, line: &str, format: OutputFormat) {
        match format {
            OutputFormat::Stdout => {
                let stdout = std::io::stdout();
                let _ = writeln!(stdout.lock(), "{line}");
            }
            OutputFormat::Stderr => {
                let stderr = std::io::stderr();
                let _ = writeln!(stderr.lock(), "{line}");
            }
            OutputFormat::Diagnostic => {
                let stdout = std::io::stdout();
                let _ = writeln!(stdout.lock(), ">> {line}");
            }
        }
    }
}

type CliOrchestrator = Orchestrator<NotifyBackend, ProcessRunner>;

struct App {
    orchestrator: CliOrchestrator,
    events: mpsc::UnboundedReceiver<ProjectEvent>,
    changes: Option<mpsc::UnboundedReceiver<RootChangeEvent>>,
}

fn build_app(cli: &Cli) -> color_eyre::Result<App> {
    let mut config = Config::default();
    config.pipeline.continue_on_failure = cli.keep_going;

    let watch_config = config.watch;
    let (keeper, changes) = WatchKeeper::new(|router| NotifyBackend::new(&watch_config, router))?;
    let pipeline = BuildPipeline::new(ProcessRunner);
    let (orchestrator, events) =
        Orchestrator::new(config, keeper, pipeline, Arc::new(ConsoleSink), None);

    Ok(App {
        orchestrator,
        events,
        changes: Some(changes),
    })
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Runs a configure and waits for the project model to install.
async fn configure_and_wait(app: &mut App, info: ProjectInfo) -> color_eyre::Result<RootId> {
    let outcome = app.orchestrator.configure(info).await?;
    let root = match outcome {
        ConfigureOutcome::Completed { root, .. }
        | ConfigureOutcome::AlreadyInProgress { root: Some(root) } => root,
        ConfigureOutcome::AlreadyInProgress { root: None } => {
            return Err(eyre!("another configure for this project is already running"));
        }
        ConfigureOutcome::Failed { report } => {
            return Err(eyre!(
                "configure failed after {} step(s), see output above",
                report.steps_run
            ));
        }
    };

    loop {
        match app.events.recv().await {
            Some(ProjectEvent::TreeReady {
                root: ready,
                nodes,
                targets,
            }) if ready == root => {
                info!(nodes, targets, "Project model ready");
                return Ok(root);
            }
            Some(ProjectEvent::ParseFailed {
                root: failed,
                message,
            }) if failed == root => {
                return Err(eyre!("project parse failed: {message}"));
            }
            Some(_) => {}
            None => return Err(eyre!("orchestrator stopped before the model was installed")),
        }
    }
}

/// Resolves action names against the discovered action list.
fn resolve_actions(
    orchestrator: &CliOrchestrator,
    root: RootId,
    names: &[String],
) -> color_eyre::Result<Vec<BuildAction>> {
    names
        .iter()
        .map(|name| {
            orchestrator.find_action(root, name).ok_or_else(|| {
                let known = orchestrator
                    .actions(root)
                    .iter()
                    .map(|a| a.name.clone())
                    .collect::<Vec<_>>()
                    .join(", ");
                eyre!("no action named '{name}' (available: {known})")
            })
        })
        .collect()
}

fn check_report(report: &PipelineReport) -> color_eyre::Result<()> {
    if report.succeeded() {
        return Ok(());
    }
    let summary = report
        .failures
        .iter()
        .map(|f| match f.exit_code {
            Some(code) => format!("'{}' exited with code {code}", f.command_line),
            None => format!("'{}' could not run", f.command_line),
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(eyre!("{} failed: {summary}", report.kind.label()))
}

async fn run_configure(mut app: App, info: ProjectInfo) -> color_eyre::Result<()> {
    let root = configure_and_wait(&mut app, info).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Discovered actions:")?;
    for action in app.orchestrator.actions(root) {
        writeln!(out, "  {}", action.name)?;
    }
    Ok(())
}

async fn run_build(mut app: App, info: ProjectInfo, targets: &[String]) -> color_eyre::Result<()> {
    let root = configure_and_wait(&mut app, info).await?;
    let names = if targets.is_empty() {
        vec!["build all".to_owned()]
    } else {
        targets.iter().map(|t| format!("build {t}")).collect()
    };
    let actions = resolve_actions(&app.orchestrator, root, &names)?;
    let report = app
        .orchestrator
        .run_actions(root, BuildKind::Build, &actions)
        .await?;
    check_report(&report)
}

async fn run_clean(mut app: App, info: ProjectInfo) -> color_eyre::Result<()> {
    let root = configure_and_wait(&mut app, info).await?;
    let actions = resolve_actions(&app.orchestrator, root, &["clean".to_owned()])?;
    let report = app
        .orchestrator
        .run_actions(root, BuildKind::Clean, &actions)
        .await?;
    check_report(&report)
}

async fn run_rebuild(mut app: App, info: ProjectInfo) -> color_eyre::Result<()> {
    let root = configure_and_wait(&mut app, info).await?;
    let names = ["clean".to_owned(), "build all".to_owned()];
    let actions = resolve_actions(&app.orchestrator, root, &names)?;
    let report = app
        .orchestrator
        .run_actions(root, BuildKind::Build, &actions)
        .await?;
    check_report(&report)
}

fn report_event(event: &ProjectEvent) {
    match event {
        ProjectEvent::TreeReady {
            root,
            nodes,
            targets,
        } => info!(%root, nodes, targets, "Project model reloaded"),
        ProjectEvent::ParseFailed { root, message } => {
            warn!(%root, %message, "Reparse failed, previous model kept");
        }
        ProjectEvent::ConfigureFailed { token, message } => {
            warn!(%token, %message, "Reconfigure failed");
        }
        ProjectEvent::RootRemoved { root } => info!(%root, "Root removed"),
    }
}

async fn run_watch(mut app: App, info: ProjectInfo) -> color_eyre::Result<()> {
    let root = configure_and_wait(&mut app, info).await?;

    let changes = app
        .changes
        .take()
        .ok_or_else(|| eyre!("change stream already consumed"))?;
    let driver = app.orchestrator.clone();
    tokio::spawn(async move { driver.drive_changes(changes).await });

    info!(%root, "Watching descriptor files; press Ctrl-C to stop");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }
                event = app.events.recv() => match event {
                    Some(event) => report_event(&event),
                    None => break,
                },
            }
        }
    }

    #[cfg(not(unix))]
    {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
                event = app.events.recv() => match event {
                    Some(event) => report_event(&event),
                    None => break,
                },
            }
        }
    }

    app.orchestrator.remove_root(root).await?;
    Ok(())
}

// =============================================================================
// ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let info = build_info(&cli)?;
    let app = build_app(&cli)?;

    match &cli.command {
        Commands::Configure => run_configure(app, info).await,
        Commands::Build { targets } => run_build(app, info, targets).await,
        Commands::Clean => run_clean(app, info).await,
        Commands::Rebuild => run_rebuild(app, info).await,
        Commands::Watch => run_watch(app, info).await,
    }
}
