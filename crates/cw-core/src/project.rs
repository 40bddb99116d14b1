//! Project identity and configuration boundary types.
//!
//! [`ProjectInfo`] is the value captured when a project is opened or
//! reconfigured. It is immutable for the duration of one configure cycle:
//! the orchestrator caches it when `configure` is called and reuses the
//! cached copy for file-change triggered reconfigures.
//!
//! Identity for caching purposes is `(language, project file path)` -
//! exposed as [`ProjectKey`]. Two infos with the same key describe the
//! same project root even if their build arguments differ.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// The toolchain family a project is configured against.
///
/// Used to select default build programs and argument conventions.
/// The set is closed; unrecognized toolchains map to [`ToolchainKind::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainKind {
    /// Toolchain could not be determined.
    #[default]
    Unknown,
    /// GCC-like toolchain (gcc, g++, MinGW).
    Gnu,
    /// MSVC-like toolchain (cl.exe, link.exe).
    Msvc,
    /// Clang/LLVM toolchain.
    Clang,
}

impl ToolchainKind {
    /// Returns a short human-readable label for the toolchain.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Gnu => "gnu",
            Self::Msvc => "msvc",
            Self::Clang => "clang",
        }
    }
}

/// Opaque handle for one opened project root.
///
/// Allocated by the orchestrator when a root is created and used by the
/// watch keeper to map descriptor files back to the roots that own them.
/// Ids are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(u64);

impl RootId {
    /// Creates a root id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Cache identity of a project: `(language, project file path)`.
///
/// # Examples
///
/// ```
/// use cw_core::{ProjectInfo, ProjectKey};
/// use camino::Utf8Path;
///
/// let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"));
/// let key = info.key();
/// assert_eq!(key, ProjectKey::new("cmake", Utf8Path::new("/proj/CMakeLists.txt")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectKey {
    /// Project language identifier (e.g. `"cmake"`, `"cxx"`).
    pub language: String,
    /// Absolute path to the project descriptor file.
    pub project_file: Utf8PathBuf,
}

impl ProjectKey {
    /// Creates a new project key.
    #[must_use]
    pub fn new(language: impl Into<String>, project_file: &Utf8Path) -> Self {
        Self {
            language: language.into(),
            project_file: project_file.to_owned(),
        }
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.language, self.project_file)
    }
}

/// Everything the orchestrator needs to know about one project.
///
/// Captured once per configure cycle and treated as immutable until the
/// cycle completes. Equality of the *cache identity* is intentionally
/// narrower than structural equality - see [`ProjectInfo::key`].
///
/// # Examples
///
/// ```
/// use cw_core::ProjectInfo;
/// use camino::Utf8Path;
///
/// let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"))
///     .with_build_program("cmake")
///     .with_build_args(["-S", ".", "-B", "build"])
///     .with_build_dir(Utf8Path::new("/proj/build"));
///
/// assert_eq!(info.build_program, "cmake");
/// assert_eq!(info.build_args.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project language identifier.
    pub language: String,

    /// Absolute path to the project descriptor (e.g. the top `CMakeLists.txt`).
    pub project_file: Utf8PathBuf,

    /// Root directory of the project sources.
    ///
    /// Defaults to the parent directory of `project_file`.
    pub root_dir: Utf8PathBuf,

    /// Program invoked for the configure step (e.g. `cmake`, `make`).
    pub build_program: String,

    /// Ordered arguments passed to the build program.
    pub build_args: Vec<String>,

    /// Directory build output is written to.
    pub build_dir: Utf8PathBuf,

    /// The toolchain family in use.
    pub toolchain: ToolchainKind,
}

impl ProjectInfo {
    /// Creates a project info for the given language and descriptor path.
    ///
    /// The root directory defaults to the descriptor's parent, the build
    /// directory to `<root>/build`, and the build program to `cmake`.
    #[must_use]
    pub fn new(language: impl Into<String>, project_file: &Utf8Path) -> Self {
        let root_dir = project_file
            .parent()
            .map_or_else(|| project_file.to_owned(), Utf8Path::to_owned);
        let build_dir = root_dir.join("build");
        Self {
            language: language.into(),
            project_file: project_file.to_owned(),
            root_dir,
            build_program: "cmake".to_owned(),
            build_args: Vec::new(),
            build_dir,
            toolchain: ToolchainKind::Unknown,
        }
    }

    /// Sets the build program.
    #[must_use]
    pub fn with_build_program(mut self, program: impl Into<String>) -> Self {
        self.build_program = program.into();
        self
    }

    /// Sets the build arguments.
    #[must_use]
    pub fn with_build_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the build output directory.
    #[must_use]
    pub fn with_build_dir(mut self, dir: &Utf8Path) -> Self {
        self.build_dir = dir.to_owned();
        self
    }

    /// Sets the toolchain kind.
    #[must_use]
    pub const fn with_toolchain(mut self, toolchain: ToolchainKind) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Returns the cache identity of this project.
    #[inline]
    #[must_use]
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.language.clone(), &self.project_file)
    }

    /// Returns the fully-expanded configure command line: program + args.
    ///
    /// This is the human-readable command the pipeline will run; it is
    /// used for diagnostics only, never for correlation (completion is
    /// matched by request token instead).
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.build_program.clone();
        for arg in &self.build_args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
