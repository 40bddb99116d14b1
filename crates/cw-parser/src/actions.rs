//! Build action enumeration for discovered targets.
//!
//! Mirrors what a project context menu offers: a default "build all" and
//! "clean" for the root, plus one build action per discovered target. The
//! actions carry `use_default_command` so the pipeline substitutes the
//! project's configured build program at execution time.

use cw_core::BuildAction;

use crate::parser::{ParseOutcome, TargetKind};

/// Enumerates the build actions available for a parsed project.
///
/// The first two entries are always "build all" and "clean"; the rest are
/// per-target build actions in discovery order. Custom targets get an
/// action too - they are invoked by name like any other target.
#[must_use]
pub fn enumerate_actions(outcome: &ParseOutcome) -> Vec<BuildAction> {
    let mut actions = vec![
        BuildAction::new("build all", "", Vec::<String>::new())
            .with_target("all")
            .with_default_command(true),
        BuildAction::new("clean", "", Vec::<String>::new())
            .with_target("clean")
            .with_default_command(true),
    ];

    for target in &outcome.targets {
        let verb = match target.kind {
            TargetKind::Executable | TargetKind::Library => "build",
            TargetKind::Custom => "run",
        };
        actions.push(
            BuildAction::new(
                format!("{verb} {}", target.name),
                "",
                Vec::<String>::new(),
            )
            .with_target(&target.name)
            .with_default_command(true),
        );
    }

    actions
}
