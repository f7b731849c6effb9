// src/pipeline/mod.rs

//! Asset pipeline layer.
//!
//! Each submodule implements one build task over the source tree, sharing a
//! [`BuildContext`] that fixes the mode, the resolved directories, and the
//! compiled static-asset manifest:
//!
//! - [`markup`] copies or collapses HTML.
//! - [`styles`] compiles SCSS entries through `grass` and `lightningcss`.
//! - [`scripts`] bundles ES-module entry points into single files.
//! - [`statics`] mirrors manifest-matched assets into the output tree.
//! - [`clean`] removes the output tree.
//! - [`lint`] checks class names against BEM rules (advisory, not a task
//!   node).
//!
//! [`executor`] owns the loop that turns `ScheduledTask`s from the engine
//! into calls of these functions.

pub mod clean;
pub mod context;
pub mod executor;
pub mod jsmin;
pub mod lint;
pub mod markup;
pub mod scripts;
pub mod statics;
pub mod styles;

pub use context::{BuildContext, BuildMode, ProjectPaths};
pub use executor::spawn_executor;

use crate::dag::{TaskKind, TaskNode};

pub const CLEAN: &str = "clean";
pub const MARKUP: &str = "markup";
pub const STYLES: &str = "styles";
pub const SCRIPTS: &str = "scripts";
pub const STATICS: &str = "static";

/// The fixed task graph: everything runs after `clean`, nothing else is
/// ordered, so the compile tasks and the static copy run concurrently.
pub fn standard_plan() -> Vec<TaskNode> {
    let compile = |name: &str, kind: TaskKind| TaskNode {
        name: name.to_string(),
        kind,
        after: vec![CLEAN.to_string()],
        notify_clients: true,
    };

    vec![
        TaskNode {
            name: CLEAN.to_string(),
            kind: TaskKind::Clean,
            after: Vec::new(),
            notify_clients: false,
        },
        compile(MARKUP, TaskKind::Markup),
        compile(STYLES, TaskKind::Styles),
        compile(SCRIPTS, TaskKind::Scripts),
        TaskNode {
            name: STATICS.to_string(),
            kind: TaskKind::Statics,
            after: vec![CLEAN.to_string()],
            notify_clients: false,
        },
    ]
}

/// Tasks triggered by a production build.
pub fn build_tasks() -> Vec<&'static str> {
    vec![CLEAN, MARKUP, STYLES, SCRIPTS, STATICS]
}

/// Tasks triggered by the initial dev pass. Static assets are served from
/// the source tree in dev, so the copy step is skipped.
pub fn dev_tasks() -> Vec<&'static str> {
    vec![CLEAN, MARKUP, STYLES, SCRIPTS]
}
