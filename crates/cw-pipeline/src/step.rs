//! Build steps, build lists, and request correlation.
//!
//! A [`BuildStep`] is one external command; a [`BuildList`] is an ordered
//! sequence of steps executed as a unit (configure, then build, say).
//! Every list carries a [`RequestToken`] allocated at creation; the
//! pipeline echoes the token in its report, and callers match completions
//! by token. Command-line text is never used for correlation - two lists
//! running the same command stay distinguishable.

use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{BuildAction, ProjectInfo};

/// Correlation token for one submitted build list.
///
/// Tokens are unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Allocates the next token.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw token value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// What a build list is for. Informational; execution is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildKind {
    /// Project configure (generates the build system).
    Configure,
    /// Build one or more targets.
    Build,
    /// Clean build output.
    Clean,
}

impl BuildKind {
    /// Returns a short human-readable label.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Clean => "clean",
        }
    }
}

/// Execution state of a build list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ListState {
    /// Not yet submitted to the pipeline.
    #[default]
    NotStarted,
    /// At least one step has started.
    Running,
    /// Every executed step exited zero.
    Succeeded,
    /// A step failed to run or exited non-zero.
    Failed,
}

impl ListState {
    /// Returns `true` for [`ListState::Succeeded`] and [`ListState::Failed`].
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Program to invoke.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Directory the program runs in.
    pub working_dir: Utf8PathBuf,
}

impl BuildStep {
    /// Creates a step from its parts.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I, working_dir: &Utf8Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.to_owned(),
        }
    }

    /// The configure step for a project: its build program with the
    /// configured arguments, run from the project root.
    #[must_use]
    pub fn configure(info: &ProjectInfo) -> Self {
        Self::new(&info.build_program, info.build_args.clone(), &info.root_dir)
    }

    /// Resolves a discovered action against a project.
    ///
    /// Actions flagged `use_default_command` run the project's build
    /// program; others run their own command. Either way the step runs in
    /// the project's build directory.
    #[must_use]
    pub fn from_action(info: &ProjectInfo, action: &BuildAction) -> Self {
        let program = if action.use_default_command {
            info.build_program.clone()
        } else {
            action.build_command.clone()
        };
        Self::new(program, action.expanded_args(), &info.build_dir)
    }

    /// Returns the full command line for diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// An ordered list of steps executed as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildList {
    /// Correlation token, allocated at creation.
    pub token: RequestToken,
    /// What the list is for.
    pub kind: BuildKind,
    /// Steps in execution order.
    pub steps: Vec<BuildStep>,
    /// When `true`, a failing step does not stop the remaining steps.
    /// The list still ends [`ListState::Failed`].
    pub continue_on_failure: bool,
}

impl BuildList {
    /// Creates a list and allocates its token.
    #[must_use]
    pub fn new(kind: BuildKind, steps: Vec<BuildStep>) -> Self {
        Self {
            token: RequestToken::next(),
            kind,
            steps,
            continue_on_failure: false,
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }
}
