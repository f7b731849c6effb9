// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::pipeline;
use crate::pipeline::statics::StaticManifest;

/// What the watcher should do when a rule matches a changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Re-run the named task.
    Trigger(TaskName),
    /// Ask connected browsers to refresh without running anything.
    Reload,
}

/// Compiled watch patterns for one concern.
///
/// The patterns are evaluated against paths relative to the source root; the
/// watcher passes strings like `"styles/site.scss"` into `matches`.
#[derive(Clone)]
pub struct WatchRule {
    label: String,
    action: WatchAction,
    include: GlobSet,
    exclude: Option<GlobSet>,
    use_hash: bool,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("label", &self.label)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    /// Stable name for logs and the hash ledger.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    /// Whether a matched change must also change the aggregate content hash
    /// before it counts.
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Returns true if this rule is interested in the given path (relative
    /// to the source root).
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build the watch rules for a project: one trigger rule per compile task
/// from the `[watch]` lists, plus a reload-only rule covering the static
/// asset manifest.
pub fn build_watch_rules(
    config: &ConfigFile,
    manifest: &StaticManifest,
) -> Result<Vec<WatchRule>> {
    let use_hash = config.watch.use_hash;

    let trigger = |task: &str, patterns: &[String]| -> Result<WatchRule> {
        Ok(WatchRule {
            label: task.to_string(),
            action: WatchAction::Trigger(task.to_string()),
            include: build_globset(patterns)
                .with_context(|| format!("building watch globset for task {task}"))?,
            exclude: None,
            use_hash,
        })
    };

    let statics_exclude = if manifest.exclude_patterns().is_empty() {
        None
    } else {
        Some(
            build_globset(manifest.exclude_patterns())
                .context("building exclude globset for static assets")?,
        )
    };

    Ok(vec![
        trigger(pipeline::MARKUP, &config.watch.markup)?,
        trigger(pipeline::STYLES, &config.watch.styles)?,
        trigger(pipeline::SCRIPTS, &config.watch.scripts)?,
        WatchRule {
            label: pipeline::STATICS.to_string(),
            action: WatchAction::Reload,
            include: build_globset(manifest.include_patterns())
                .context("building watch globset for static assets")?,
            exclude: statics_exclude,
            use_hash,
        },
    ])
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob =
            Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
