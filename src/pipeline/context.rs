// src/pipeline/context.rs

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use lightningcss::targets::Browsers;

use crate::config::model::ConfigFile;
use crate::pipeline::statics::StaticManifest;

/// Whether outputs are readable-and-mapped or minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn is_development(self) -> bool {
        matches!(self, BuildMode::Development)
    }
}

/// Resolved project directories.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
}

/// Everything a pipeline task needs to run, resolved once per session.
///
/// The context is immutable after construction; tasks receive it behind an
/// `Arc` and never communicate through globals.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub mode: BuildMode,
    pub paths: ProjectPaths,
    pub config: ConfigFile,
    /// Compiled static asset manifest, shared by the copy task, the dev
    /// server and the watcher.
    pub manifest: StaticManifest,
    /// Browser versions resolved from `[targets].browsers`; `None` when no
    /// queries are configured.
    pub browsers: Option<Browsers>,
    /// The same targets rendered as `name<major>[.<minor>]` strings for the
    /// script pipeline's logs.
    pub script_targets: Vec<String>,
}

impl BuildContext {
    /// Resolve a validated config against the directory containing it.
    pub fn new(config: ConfigFile, mode: BuildMode, base_dir: &Path) -> Result<Self> {
        let paths = ProjectPaths {
            source_root: base_dir.join(&config.project.source_dir),
            output_root: base_dir.join(&config.project.output_dir),
        };
        let manifest = StaticManifest::compile(&config.statics.patterns)?;
        let browsers = resolve_browser_targets(&config.targets.browsers)?;
        let script_targets = script_target_strings(&browsers);

        Ok(Self {
            mode,
            paths,
            config,
            manifest,
            browsers,
            script_targets,
        })
    }
}

/// Resolve browserslist queries into concrete minimum browser versions.
///
/// An empty query list means "no targets": styles and scripts are emitted
/// without version-based lowering.
pub fn resolve_browser_targets(queries: &[String]) -> Result<Option<Browsers>> {
    if queries.is_empty() {
        return Ok(None);
    }
    Browsers::from_browserslist(queries)
        .map_err(|e| anyhow!("resolving browserslist queries {:?}: {}", queries, e))
}

/// Render resolved browser versions as compact target strings, e.g.
/// `chrome112` or `safari15.6`.
pub fn script_target_strings(browsers: &Option<Browsers>) -> Vec<String> {
    let browsers = match browsers {
        Some(b) => b,
        None => return Vec::new(),
    };

    let pairs: [(&str, Option<u32>); 7] = [
        ("chrome", browsers.chrome),
        ("edge", browsers.edge),
        ("firefox", browsers.firefox),
        ("ie", browsers.ie),
        ("ios", browsers.ios_saf),
        ("opera", browsers.opera),
        ("safari", browsers.safari),
    ];

    pairs
        .iter()
        .filter_map(|(name, version)| version.map(|v| format!("{}{}", name, render_version(v))))
        .collect()
}

/// Browser versions are packed as `major << 16 | minor << 8 | patch`.
fn render_version(encoded: u32) -> String {
    let major = encoded >> 16;
    let minor = (encoded >> 8) & 0xff;
    if minor == 0 {
        major.to_string()
    } else {
        format!("{major}.{minor}")
    }
}

/// Forward-slash relative path of `path` under `root`, or `None` when
/// `path` is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
