// src/pipeline/statics.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;
use tracing::debug;
use walkdir::WalkDir;

use crate::pipeline::context::{relative_str, BuildContext};
use crate::watch::patterns::build_globset;

/// Compiled static asset manifest.
///
/// Patterns are source-root-relative globs; a leading `!` marks an
/// exclusion. The manifest is the single source of truth for which files
/// count as static assets: the copy task, the dev server routes and the
/// watcher's reload rule all derive from it.
#[derive(Debug, Clone)]
pub struct StaticManifest {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    includes: GlobSet,
    excludes: GlobSet,
}

impl StaticManifest {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut include_patterns = Vec::new();
        let mut exclude_patterns = Vec::new();
        for raw in patterns {
            match raw.strip_prefix('!') {
                Some(rest) => exclude_patterns.push(rest.to_string()),
                None => include_patterns.push(raw.clone()),
            }
        }

        let includes = build_globset(&include_patterns)?;
        let excludes = build_globset(&exclude_patterns)?;

        Ok(Self {
            include_patterns,
            exclude_patterns,
            includes,
            excludes,
        })
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Whether a source-root-relative path is a static asset.
    pub fn is_match(&self, rel: &str) -> bool {
        self.includes.is_match(rel) && !self.excludes.is_match(rel)
    }

    /// Derive dev-server routes from the include patterns.
    ///
    /// Each pattern whose leading components are literal directories maps to
    /// a route serving that directory straight from the source tree, e.g.
    /// `fonts/**/*.woff2` becomes `/fonts` -> `<source>/fonts`. Patterns
    /// that start with a wildcard have no directory to mount and derive no
    /// route.
    pub fn routes(&self, source_root: &Path) -> Vec<StaticRoute> {
        let mut routes: Vec<StaticRoute> = Vec::new();

        for pattern in &self.include_patterns {
            let components: Vec<&str> = pattern.split('/').collect();
            let literal_prefix: Vec<&str> = components
                .iter()
                .take(components.len().saturating_sub(1))
                .take_while(|c| is_literal_component(c))
                .copied()
                .collect();
            if literal_prefix.is_empty() {
                continue;
            }

            let route = format!("/{}", literal_prefix.join("/"));
            if routes.iter().any(|r| r.route == route) {
                continue;
            }

            let mut dir = source_root.to_path_buf();
            for part in &literal_prefix {
                dir.push(part);
            }
            routes.push(StaticRoute { route, dir });
        }

        routes
    }
}

/// One dev-server mount: requests under `route` are served from `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    pub route: String,
    pub dir: PathBuf,
}

fn is_literal_component(component: &str) -> bool {
    !component
        .chars()
        .any(|c| matches!(c, '*' | '?' | '[' | '{' | '!'))
}

/// Copy every manifest-matched file from the source tree into the output
/// tree, byte for byte, preserving relative paths.
///
/// Returns the number of files copied.
pub fn copy(ctx: &BuildContext) -> Result<usize> {
    let source_root = &ctx.paths.source_root;
    let mut copied = 0usize;

    for entry in WalkDir::new(source_root) {
        let entry = entry.with_context(|| format!("walking {:?}", source_root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match relative_str(source_root, entry.path()) {
            Some(rel) => rel,
            None => continue,
        };
        if !ctx.manifest.is_match(&rel) {
            continue;
        }

        let dest = ctx.paths.output_root.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?;
        }
        fs::copy(entry.path(), &dest)
            .with_context(|| format!("copying {} to {:?}", rel, dest))?;
        debug!(file = %rel, "copied static asset");
        copied += 1;
    }

    Ok(copied)
}
