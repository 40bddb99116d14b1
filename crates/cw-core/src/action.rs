//! Build actions discovered for project targets.
//!
//! A [`BuildAction`] describes one invocable build operation for a target
//! found during a parse (build it, clean it, run a custom command). The
//! presentation layer turns these into context-menu entries; the core only
//! enumerates them and expands them into pipeline steps.

use serde::{Deserialize, Serialize};

/// One invocable build operation for a discovered target.
///
/// # Examples
///
/// ```
/// use cw_core::BuildAction;
///
/// let action = BuildAction::new("build app", "make", ["app"]);
/// assert_eq!(action.expanded_args(), vec!["app".to_owned()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAction {
    /// Display name of the action (e.g. `"build app"`).
    pub name: String,

    /// Program to run. Empty when `use_default_command` is set.
    pub build_command: String,

    /// Arguments passed to the program, before the target name.
    pub build_args: Vec<String>,

    /// Target name appended to the argument list, if any.
    pub build_target: Option<String>,

    /// Whether a failing step halts the remaining list.
    pub stop_on_error: bool,

    /// Use the project's default build program instead of `build_command`.
    pub use_default_command: bool,
}

impl BuildAction {
    /// Creates an action with the given name, command, and arguments.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            build_command: command.into(),
            build_args: args.into_iter().map(Into::into).collect(),
            build_target: None,
            stop_on_error: true,
            use_default_command: false,
        }
    }

    /// Sets the target name appended to the arguments.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.build_target = Some(target.into());
        self
    }

    /// Marks the action as using the project default build program.
    #[must_use]
    pub fn with_default_command(mut self, use_default: bool) -> Self {
        self.use_default_command = use_default;
        self
    }

    /// Returns the full argument list with the target appended and
    /// empty arguments filtered out.
    #[must_use]
    pub fn expanded_args(&self) -> Vec<String> {
        self.build_args
            .iter()
            .cloned()
            .chain(self.build_target.clone())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_args_appends_target() {
        let action = BuildAction::new("build app", "make", ["-C", "build"]).with_target("app");
        assert_eq!(action.expanded_args(), vec!["-C", "build", "app"]);
    }

    #[test]
    fn test_expanded_args_filters_empty() {
        let action = BuildAction::new("build", "make", ["", "-j4"]);
        assert_eq!(action.expanded_args(), vec!["-j4"]);
    }

    #[test]
    fn test_defaults() {
        let action = BuildAction::new("clean", "make", ["clean"]);
        assert!(action.stop_on_error);
        assert!(!action.use_default_command);
        assert!(action.build_target.is_none());
    }
}
