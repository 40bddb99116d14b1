//! Descriptor parsing and item tree construction.
//!
//! [`ProjectParser::parse`] reads the project's root descriptor, follows
//! `add_subdirectory` references (in parallel, with rayon), and produces a
//! [`ParseOutcome`]: the populated [`ItemTree`], the discovered build
//! targets, and the list of descriptor files that were read. The file list
//! is what the watch keeper registers for the root.
//!
//! The parser is synchronous and touches no shared state; the orchestrator
//! runs it inside `spawn_blocking` on the root's worker pool. Parses for
//! different roots can run truly in parallel.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{FxHashMap, FxHashSet, ItemTree, NodeId, NodeKind, ParserConfig, ProjectInfo};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::lexer::{lex, Command};

/// The kind of a discovered build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// `add_executable`.
    Executable,
    /// `add_library`.
    Library,
    /// `add_custom_target`.
    Custom,
}

/// A build target discovered during a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target name as written in the descriptor.
    pub name: String,
    /// Target kind.
    pub kind: TargetKind,
    /// Absolute paths of the target's listed sources.
    pub sources: Vec<Utf8PathBuf>,
    /// The descriptor file that defined the target.
    pub defined_in: Utf8PathBuf,
}

/// Result of a successful parse.
///
/// A parse with zero targets is still a success; failure is expressed as
/// [`ParseError`] and produces no outcome at all.
#[derive(Debug)]
pub struct ParseOutcome {
    /// Name from the `project()` command, if any.
    pub project_name: Option<String>,
    /// The populated item tree, one root node.
    pub tree: ItemTree,
    /// Discovered build targets, root descriptor first.
    pub targets: Vec<TargetInfo>,
    /// Every descriptor file read: the root `CMakeLists.txt`, each
    /// subdirectory descriptor, and included `.cmake` files.
    pub descriptor_files: Vec<Utf8PathBuf>,
}

/// Per-descriptor intermediate parse result.
#[derive(Debug)]
struct DirParse {
    dir: Utf8PathBuf,
    descriptor: Utf8PathBuf,
    project_name: Option<String>,
    targets: Vec<TargetInfo>,
    includes: Vec<Utf8PathBuf>,
    children: Vec<DirParse>,
}

/// Keyword arguments that are not source files.
const EXECUTABLE_KEYWORDS: &[&str] = &["WIN32", "MACOSX_BUNDLE", "EXCLUDE_FROM_ALL"];
const LIBRARY_KEYWORDS: &[&str] = &[
    "STATIC",
    "SHARED",
    "MODULE",
    "OBJECT",
    "INTERFACE",
    "EXCLUDE_FROM_ALL",
    "ALIAS",
];

/// Parser for CMake-family project descriptors.
///
/// # Examples
///
/// ```no_run
/// use cw_parser::ProjectParser;
/// use cw_core::{ParserConfig, ProjectInfo};
/// use camino::Utf8Path;
///
/// let info = ProjectInfo::new("cmake", Utf8Path::new("/proj/CMakeLists.txt"));
/// let parser = ProjectParser::new(ParserConfig::default());
/// let outcome = parser.parse(&info)?;
/// println!("{} targets", outcome.targets.len());
/// # Ok::<(), cw_parser::ParseError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProjectParser {
    config: ParserConfig,
    /// Bounded pool for subdirectory parsing when `max_parallel_jobs`
    /// is set; `None` uses rayon's global pool.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Default for ProjectParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl ProjectParser {
    /// Creates a parser with the given configuration.
    ///
    /// When `max_parallel_jobs` is set, subdirectory descriptors parse on
    /// a dedicated pool of that many threads. If the pool cannot be built
    /// the parser logs and falls back to the global one.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        let pool = config.max_parallel_jobs.and_then(|jobs| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(jobs.max(1))
                .build()
                .inspect_err(|error| {
                    warn!(%error, "Could not build bounded parse pool, using the global one");
                })
                .ok()
                .map(Arc::new)
        });
        Self { config, pool }
    }

    /// Parses the project described by `info` into an item tree.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for unreadable, empty, or malformed
    /// descriptors, and when subdirectory nesting exceeds the configured
    /// limit. A failed parse leaves nothing behind - no partial tree is
    /// returned.
    pub fn parse(&self, info: &ProjectInfo) -> Result<ParseOutcome, ParseError> {
        let visited = Mutex::new(FxHashSet::default());
        let root = match &self.pool {
            Some(pool) => pool.install(|| self.parse_descriptor(&info.project_file, 0, &visited)),
            None => self.parse_descriptor(&info.project_file, 0, &visited),
        }?;
        let root = root.ok_or_else(|| {
            // The root descriptor can only be "already visited" if the
            // caller passed a path twice, which we treat as unreadable.
            ParseError::read(
                info.project_file.clone(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "root descriptor revisited"),
            )
        })?;

        let project_name = root.project_name.clone();
        let root_name = project_name.clone().unwrap_or_else(|| {
            info.root_dir
                .file_name()
                .unwrap_or("project")
                .to_owned()
        });

        let mut tree = ItemTree::new(root_name, &info.root_dir);
        let mut targets = Vec::new();
        let mut descriptor_files = Vec::new();
        let root_id = tree.root_id();
        Self::install_dir(&mut tree, root_id, &root, &mut targets, &mut descriptor_files)?;

        debug!(
            descriptor = %info.project_file,
            nodes = tree.len(),
            targets = targets.len(),
            "Parse completed"
        );

        Ok(ParseOutcome {
            project_name,
            tree,
            targets,
            descriptor_files,
        })
    }

    /// Parses one descriptor and, recursively, its subdirectories.
    ///
    /// Returns `Ok(None)` when the descriptor was already visited
    /// (a cycle through symlinks or repeated `add_subdirectory`).
    fn parse_descriptor(
        &self,
        descriptor: &Utf8Path,
        depth: usize,
        visited: &Mutex<FxHashSet<Utf8PathBuf>>,
    ) -> Result<Option<DirParse>, ParseError> {
        if depth > self.config.max_subdir_depth {
            return Err(ParseError::DepthExceeded {
                path: descriptor.to_owned(),
                limit: self.config.max_subdir_depth,
            });
        }

        let canonical = descriptor
            .canonicalize_utf8()
            .unwrap_or_else(|_| descriptor.to_owned());
        if !visited.lock().insert(canonical) {
            warn!(descriptor = %descriptor, "Descriptor already visited, skipping");
            return Ok(None);
        }

        let source = fs::read_to_string(descriptor.as_std_path())
            .map_err(|e| ParseError::read(descriptor, e))?;
        let commands = lex(&source, descriptor)?;
        if commands.is_empty() {
            return Err(ParseError::EmptyDescriptor(descriptor.to_owned()));
        }

        let dir = descriptor
            .parent()
            .map_or_else(|| descriptor.to_owned(), Utf8Path::to_owned);

        let mut parse = DirParse {
            dir: dir.clone(),
            descriptor: descriptor.to_owned(),
            project_name: None,
            targets: Vec::new(),
            includes: Vec::new(),
            children: Vec::new(),
        };
        let mut vars: FxHashMap<String, String> = FxHashMap::default();
        let mut subdirs: Vec<Utf8PathBuf> = Vec::new();

        for command in &commands {
            let args: Vec<String> = command
                .args
                .iter()
                .map(|a| expand_vars(a, &vars))
                .collect();
            self.interpret(command, &args, &dir, &mut parse, &mut vars, &mut subdirs);
        }

        // Subdirectory descriptors are independent of each other; parse
        // them in parallel. The visited set keeps symlink cycles finite.
        let children: Result<Vec<Option<DirParse>>, ParseError> = subdirs
            .par_iter()
            .map(|sub| self.parse_descriptor(sub, depth + 1, visited))
            .collect();
        parse.children = children?.into_iter().flatten().collect();

        Ok(Some(parse))
    }

    /// Applies one command to the in-progress directory parse.
    fn interpret(
        &self,
        command: &Command,
        args: &[String],
        dir: &Utf8Path,
        parse: &mut DirParse,
        vars: &mut FxHashMap<String, String>,
        subdirs: &mut Vec<Utf8PathBuf>,
    ) {
        match command.name.as_str() {
            "project" => {
                if let Some(name) = args.first() {
                    parse.project_name = Some(name.clone());
                }
            }
            "set" => match args.split_first() {
                Some((name, [])) => {
                    vars.remove(name);
                }
                Some((name, values)) => {
                    vars.insert(name.clone(), values.join(";"));
                }
                None => {}
            },
            "add_executable" => {
                self.add_target(parse, dir, args, TargetKind::Executable, EXECUTABLE_KEYWORDS);
            }
            "add_library" => {
                self.add_target(parse, dir, args, TargetKind::Library, LIBRARY_KEYWORDS);
            }
            "add_custom_target" => {
                if let Some(name) = args.first() {
                    parse.targets.push(TargetInfo {
                        name: name.clone(),
                        kind: TargetKind::Custom,
                        sources: Vec::new(),
                        defined_in: parse.descriptor.clone(),
                    });
                }
            }
            "add_subdirectory" => {
                if let Some(sub) = args.first() {
                    let descriptor = dir.join(sub).join("CMakeLists.txt");
                    if descriptor.is_file() {
                        subdirs.push(descriptor);
                    } else {
                        warn!(
                            descriptor = %descriptor,
                            line = command.line,
                            "add_subdirectory target has no CMakeLists.txt"
                        );
                    }
                }
            }
            "include" => {
                if let Some(included) = args.first() {
                    let path = dir.join(included);
                    if path.extension() == Some("cmake") && path.is_file() {
                        parse.includes.push(path);
                    }
                }
            }
            // Everything else (compile options, install rules, ...) is
            // irrelevant to the project model.
            _ => {}
        }
    }

    fn add_target(
        &self,
        parse: &mut DirParse,
        dir: &Utf8Path,
        args: &[String],
        kind: TargetKind,
        keywords: &[&str],
    ) {
        let Some((name, rest)) = args.split_first() else {
            return;
        };

        let mut seen = FxHashSet::default();
        let sources: Vec<Utf8PathBuf> = rest
            .iter()
            .filter(|a| !a.is_empty() && !keywords.contains(&a.as_str()))
            .map(|a| resolve_path(dir, a))
            .filter(|p| seen.insert(p.clone()))
            .collect();

        parse.targets.push(TargetInfo {
            name: name.clone(),
            kind,
            sources,
            defined_in: parse.descriptor.clone(),
        });
    }

    /// Installs a directory parse into the tree under `parent`.
    fn install_dir(
        tree: &mut ItemTree,
        parent: NodeId,
        parse: &DirParse,
        targets: &mut Vec<TargetInfo>,
        descriptor_files: &mut Vec<Utf8PathBuf>,
    ) -> Result<(), ParseError> {
        descriptor_files.push(parse.descriptor.clone());

        let descriptor_name = parse.descriptor.file_name().unwrap_or("CMakeLists.txt");
        tree.add_child(parent, descriptor_name, &parse.descriptor, NodeKind::File)?;

        for include in &parse.includes {
            descriptor_files.push(include.clone());
            let name = include.file_name().unwrap_or("include.cmake");
            Self::add_or_skip(tree, parent, name, include, NodeKind::File);
        }

        for target in &parse.targets {
            let target_path = parse.dir.join(&target.name);
            let Some(target_id) =
                Self::add_or_skip(tree, parent, &target.name, &target_path, NodeKind::Target)
            else {
                continue;
            };
            for source in &target.sources {
                let name = source.file_name().unwrap_or(source.as_str());
                Self::add_or_skip(tree, target_id, name, source, NodeKind::File);
            }
            targets.push(target.clone());
        }

        for child in &parse.children {
            let name = child.dir.file_name().unwrap_or(child.dir.as_str());
            let Some(dir_id) =
                Self::add_or_skip(tree, parent, name, &child.dir, NodeKind::Directory)
            else {
                continue;
            };
            Self::install_dir(tree, dir_id, child, targets, descriptor_files)?;
        }

        Ok(())
    }

    /// Adds a child node, skipping (with a warning) path collisions
    /// between siblings - e.g. a target named like a subdirectory.
    fn add_or_skip(
        tree: &mut ItemTree,
        parent: NodeId,
        name: &str,
        path: &Utf8Path,
        kind: NodeKind,
    ) -> Option<NodeId> {
        match tree.add_child(parent, name, path, kind) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping colliding tree node");
                None
            }
        }
    }
}

/// Expands `${VAR}` references using the current variable scope.
///
/// Unknown variables expand to the empty string, matching CMake. A small
/// iteration cap keeps pathological self-referencing values finite.
fn expand_vars(arg: &str, vars: &FxHashMap<String, String>) -> String {
    let mut result = arg.to_owned();
    for _ in 0..8 {
        let Some(start) = result.find("${") else {
            return result;
        };
        let Some(end) = result[start..].find('}') else {
            return result;
        };
        let name = &result[start + 2..start + end];
        let value = vars.get(name).map_or("", String::as_str);
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_path(dir: &Utf8Path, arg: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(arg);
    if path.is_absolute() {
        path.to_owned()
    } else {
        dir.join(path)
    }
}
